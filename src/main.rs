use animal_id::catalog::AnimalCatalog;
use animal_id::config::Settings;
use animal_id::error::AppError;
use animal_id::network::{AppState, Server, UploadStore, build_router};
use animal_id::pipeline::IdentificationPipeline;
use animal_id::pipeline::services::{
    ClassificationService, ImagePreprocessor, OnnxClassifier, PreprocessingService,
};
use std::sync::Arc;
use tracing::{Level, info};

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let settings = Settings::load()?;
    init_logging(settings.log_level()?);

    // Loaded once; every request shares this handle.
    let classifier = Arc::new(OnnxClassifier::load(&settings.model)?);
    let pipeline = IdentificationPipeline::new(
        PreprocessingService::new(ImagePreprocessor::from_settings(&settings.model)),
        ClassificationService::new(classifier),
    );
    let catalog = AnimalCatalog::builtin();
    info!(
        "Catalog ready with {} species: {}",
        catalog.len(),
        catalog.names().collect::<Vec<_>>().join(", ")
    );

    let state = AppState::new(
        catalog,
        pipeline,
        UploadStore::from_settings(&settings.uploads),
    );
    let router = build_router(state, settings.server.max_upload_bytes);
    Server::new(settings.bind_address()?, router).start().await
}
