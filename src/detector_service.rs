use crate::detection::RawDetections;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Runs a pretrained detector over encoded image bytes and returns the
/// model's full output. Injected into the handlers at construction time so
/// tests can substitute a fake.
#[async_trait]
pub trait DetectorService: Send + Sync + Clone + 'static {
    async fn detect(&self, image_data: &[u8]) -> Result<RawDetections, DetectError>;
}
