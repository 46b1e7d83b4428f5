use crate::{
    annotator::Annotator,
    detection::{top_detections, Detection},
    detector_service::DetectorService,
    routes::RecognitionError,
    server::SharedState,
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageFormat, RgbImage};
use serde::Deserialize;
use std::io::Cursor;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct AnnotateParams {
    pub url: String,
}

/// Fetches the image behind `url`, annotates the top detections, and returns
/// the image re-encoded in its original container format, base64-encoded in
/// the body with the original MIME type in `Content-Type`.
#[instrument(skip(state, params))]
pub async fn annotate_image<D: DetectorService>(
    State(state): State<SharedState<D>>,
    Query(params): Query<AnnotateParams>,
) -> Result<Response, RecognitionError> {
    let image_data = state.fetcher.fetch_image(&params.url).await?;

    let raw = state.detector.detect(&image_data).await?;
    let detections = top_detections(&raw, state.num_objects);

    let (image, format) = decode_for_annotation(&image_data)?;
    let body = render_annotated(&state.annotator, image, format, &detections)?;

    let response = Response::builder()
        .header(header::CONTENT_TYPE, format.to_mime_type())
        .header("x-base64-encoded", "true")
        .body(Body::from(body))
        .map_err(|e| RecognitionError::HttpBuilder(e.to_string()))?;

    Ok(response)
}

/// Decodes while remembering the container format, so the annotated image
/// can be re-encoded as what it came in as (JPEG stays JPEG).
fn decode_for_annotation(image_data: &[u8]) -> Result<(RgbImage, ImageFormat), RecognitionError> {
    let format = image::guess_format(image_data)
        .map_err(|e| RecognitionError::Decode(e.to_string()))?;
    let decoded = image::load_from_memory_with_format(image_data, format)
        .map_err(|e| RecognitionError::Decode(e.to_string()))?;

    Ok((decoded.to_rgb8(), format))
}

fn render_annotated(
    annotator: &Annotator,
    mut image: RgbImage,
    format: ImageFormat,
    detections: &[Detection],
) -> Result<String, RecognitionError> {
    annotator.annotate(&mut image, detections);
    let encoded = encode_image(&image, format)?;

    Ok(BASE64.encode(&encoded))
}

fn encode_image(image: &RgbImage, format: ImageFormat) -> Result<Vec<u8>, RecognitionError> {
    let mut encoded = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut encoded), format)
        .map_err(|e| RecognitionError::Encode(e.to_string()))?;

    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn encoded_fixture(format: ImageFormat) -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(64, 48, Rgb([40, 120, 200]));
        let mut data = Vec::new();
        img.write_to(&mut Cursor::new(&mut data), format).unwrap();
        data
    }

    #[test]
    fn decode_preserves_container_format() {
        let jpeg = encoded_fixture(ImageFormat::Jpeg);
        let (image, format) = decode_for_annotation(&jpeg).unwrap();
        assert_eq!(format, ImageFormat::Jpeg);
        assert_eq!(format.to_mime_type(), "image/jpeg");
        assert_eq!(image.dimensions(), (64, 48));

        let png = encoded_fixture(ImageFormat::Png);
        let (_, format) = decode_for_annotation(&png).unwrap();
        assert_eq!(format, ImageFormat::Png);
        assert_eq!(format.to_mime_type(), "image/png");
    }

    #[test]
    fn decode_rejects_corrupt_payload() {
        let result = decode_for_annotation(b"not an image at all");
        assert!(matches!(result, Err(RecognitionError::Decode(_))));
    }

    #[test]
    fn reencode_keeps_jpeg_as_jpeg() {
        let jpeg = encoded_fixture(ImageFormat::Jpeg);
        let (image, format) = decode_for_annotation(&jpeg).unwrap();
        let reencoded = encode_image(&image, format).unwrap();
        assert_eq!(image::guess_format(&reencoded).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn decode_rejects_truncated_image() {
        let mut jpeg = encoded_fixture(ImageFormat::Jpeg);
        jpeg.truncate(jpeg.len() / 4);
        let result = decode_for_annotation(&jpeg);
        assert!(matches!(result, Err(RecognitionError::Decode(_))));
    }
}
