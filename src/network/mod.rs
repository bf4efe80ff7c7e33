pub mod identify;
pub mod server;
pub mod upload;

pub use identify::IdentifyResponse;
pub use server::{AppState, Server, build_router};
pub use upload::{UploadGuard, UploadStore};
