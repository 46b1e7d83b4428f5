use crate::{detector_service::DetectorService, routes::RecognitionError, server::SharedState};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct DetectionsRequest {
    pub url: String,
}

/// The model's full output as three parallel arrays of equal length. Boxes
/// keep the model's native normalized `[ymin, xmin, ymax, xmax]` ordering;
/// nothing is truncated here, unlike the annotating handler.
#[derive(Debug, Serialize)]
pub struct DetectionsResponse {
    pub detection_boxes: Vec<[f32; 4]>,
    pub detection_scores: Vec<f32>,
    pub detection_class_entities: Vec<String>,
}

#[instrument(skip(state, request))]
pub async fn raw_detections<D: DetectorService>(
    State(state): State<SharedState<D>>,
    Json(request): Json<DetectionsRequest>,
) -> Result<Json<DetectionsResponse>, RecognitionError> {
    let image_data = state.fetcher.fetch_image(&request.url).await?;
    let raw = state.detector.detect(&image_data).await?;

    tracing::debug!("Returning {} raw detections", raw.len());

    Ok(Json(DetectionsResponse {
        detection_boxes: raw.boxes,
        detection_scores: raw.scores,
        detection_class_entities: raw.labels,
    }))
}
