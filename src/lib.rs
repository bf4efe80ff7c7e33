pub mod catalog;
pub mod config;
pub mod error;
pub mod network;
pub mod pipeline;

pub use catalog::{AnimalCatalog, AnimalRecord};
pub use config::Settings;
pub use error::{AppError, ValidationError};
pub use network::{AppState, Server, UploadStore, build_router};
pub use pipeline::IdentificationPipeline;
