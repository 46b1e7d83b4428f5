use crate::{
    annotator::Annotator, config::Config, fetcher::Fetcher, ort_service::OrtDetectorService,
    server::{HttpServer, SharedState},
};
use std::{error::Error, sync::Arc};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let detector = match OrtDetectorService::new(&config.model, &config.labels) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("Failed to initialize detector: {:?}", e);
            return Err(e);
        }
    };

    let annotator = match Annotator::from_config(&config.font) {
        Ok(annotator) => Arc::new(annotator),
        Err(e) => {
            tracing::error!("Failed to initialize annotator: {:?}", e);
            return Err(e);
        }
    };

    let fetcher = Fetcher::new(&config.fetcher)?;

    let state = SharedState {
        detector,
        annotator,
        fetcher,
        num_objects: config.model.num_objects,
    };

    let server = HttpServer::new(state, &config.server).await?;
    server.run().await?;

    Ok(())
}
