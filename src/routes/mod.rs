mod annotate;
mod detections;
mod health;

use crate::{
    detector_service::{DetectError, DetectorService},
    fetcher::FetchError,
    server::SharedState,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use thiserror::Error;

pub fn api_routes<D: DetectorService>() -> Router<SharedState<D>> {
    Router::new()
        .route("/annotate", get(annotate::annotate_image::<D>))
        .route("/detections", post(detections::raw_detections::<D>))
        .route("/healthz", get(health::healthcheck))
}

/// One error kind per pipeline stage, each mapped to its own status code so
/// a bad URL, a bad image, and a model failure are distinguishable from the
/// outside.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("failed to fetch image: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("failed to encode annotated image: {0}")]
    Encode(String),
    #[error("HTTP builder failed: {0}")]
    HttpBuilder(String),
}

impl From<DetectError> for RecognitionError {
    fn from(err: DetectError) -> Self {
        match err {
            DetectError::Decode(e) => RecognitionError::Decode(e),
            DetectError::Inference(e) => RecognitionError::Inference(e),
        }
    }
}

impl IntoResponse for RecognitionError {
    fn into_response(self) -> Response {
        let status = match &self {
            RecognitionError::Fetch(_) => StatusCode::BAD_GATEWAY,
            RecognitionError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RecognitionError::Inference(_)
            | RecognitionError::Encode(_)
            | RecognitionError::HttpBuilder(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!("Request failed: {}", self);

        (status, self.to_string()).into_response()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_distinct_status_codes() {
        let fetch = RecognitionError::Fetch(FetchError::UpstreamStatus(
            reqwest::StatusCode::NOT_FOUND,
        ));
        assert_eq!(fetch.into_response().status(), StatusCode::BAD_GATEWAY);

        let decode = RecognitionError::Decode("bad bytes".to_string());
        assert_eq!(
            decode.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let inference = RecognitionError::Inference("boom".to_string());
        assert_eq!(
            inference.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
