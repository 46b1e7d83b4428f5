use crate::{
    config::{LabelsConfig, ModelConfig},
    detection::RawDetections,
    detector_service::{DetectError, DetectorService},
};
use async_trait::async_trait;
use ndarray::{Array, ArrayD, Axis, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

/// Decodes encoded image bytes into an NHWC float tensor scaled to [0, 1].
/// The detector accepts variable spatial dimensions, so no resizing happens
/// here; the original width and height are returned alongside the tensor.
fn image_to_tensor(image_data: &[u8]) -> Result<(Array<f32, Ix4>, u32, u32), DetectError> {
    let image_reader = image::ImageReader::new(std::io::Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| DetectError::Decode(format!("Error decoding image: {}", e)))?;

    let original_img = image_reader
        .decode()
        .map_err(|e| DetectError::Decode(format!("Error decoding image: {}", e)))?;

    let img = original_img.to_rgb8();
    let (img_width, img_height) = img.dimensions();

    let mut input = Array::zeros((1, img_height as usize, img_width as usize, 3));
    for (x, y, pixel) in img.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, y, x, 0]] = (r as f32) / 255.;
        input[[0, y, x, 1]] = (g as f32) / 255.;
        input[[0, y, x, 2]] = (b as f32) / 255.;
    }

    Ok((input, img_width, img_height))
}

fn load_class_labels(filepath: &Path) -> io::Result<Vec<String>> {
    let file = File::open(filepath)?;
    let reader = io::BufReader::new(file);
    let mut labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let label = line.trim();
        if !label.is_empty() {
            labels.push(label.to_string());
        }
    }

    if labels.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("No class labels found in {:?}", filepath),
        ));
    }

    Ok(labels)
}

/// Drops a leading batch axis of size one, so `[1, M, 4]` and `[M, 4]`
/// outputs read the same downstream.
fn squeeze_batch(array: ArrayD<f32>, expected_ndim: usize) -> ArrayD<f32> {
    if array.ndim() == expected_ndim + 1 && array.shape()[0] == 1 {
        array.index_axis_move(Axis(0), 0)
    } else {
        array
    }
}

#[derive(Clone)]
pub struct OrtDetectorService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    class_labels: Arc<Vec<String>>,
}

impl OrtDetectorService {
    pub fn new(
        model_config: &ModelConfig,
        labels_config: &LabelsConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        ort::init().commit()?;

        let num_instances = model_config.num_instances;
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_model_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        let class_labels = load_class_labels(&labels_config.get_path())?;

        tracing::info!(
            "Created {} ONNX sessions, loaded {} class labels",
            num_instances,
            class_labels.len()
        );

        Ok(Self {
            counter: Arc::new(AtomicUsize::new(0)),
            sessions: Arc::new(sessions),
            class_labels: Arc::new(class_labels),
        })
    }

    /// Runs the pooled session round-robin and extracts the detector's three
    /// named outputs: boxes `[M, 4]`, scores `[M]`, class ids `[M]`.
    fn run_inference(
        &self,
        input: &Array<f32, Ix4>,
    ) -> Result<(ArrayD<f32>, ArrayD<f32>, ArrayD<f32>), DetectError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let session_arc = &self.sessions[index];
        let mut session = session_arc
            .lock()
            .map_err(|e| DetectError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)
            .map_err(|e| DetectError::Inference(format!("failed to build tensor: {}", e)))?;

        let input_tensor = ort::inputs![tensor_ref];

        let outputs = session
            .run(input_tensor)
            .map_err(|e| DetectError::Inference(format!("inference failed: {}", e)))?;

        let (shape, data) = outputs["detection_boxes"]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::Inference(format!("failed to extract boxes: {}", e)))?;
        let boxes = ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| DetectError::Inference(format!("invalid boxes shape: {}", e)))?;

        let (shape, data) = outputs["detection_scores"]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::Inference(format!("failed to extract scores: {}", e)))?;
        let scores = ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| DetectError::Inference(format!("invalid scores shape: {}", e)))?;

        let (shape, data) = outputs["detection_classes"]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::Inference(format!("failed to extract classes: {}", e)))?;
        let classes = ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| DetectError::Inference(format!("invalid classes shape: {}", e)))?;

        Ok((boxes, scores, classes))
    }

    fn class_label(&self, class_id: usize) -> String {
        self.class_labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("Unknown class {}", class_id))
    }
}

#[async_trait]
impl DetectorService for OrtDetectorService {
    async fn detect(&self, image_data: &[u8]) -> Result<RawDetections, DetectError> {
        let (input, _, _) = image_to_tensor(image_data)?;
        let (boxes, scores, classes) = self.run_inference(&input)?;

        let boxes = squeeze_batch(boxes, 2);
        let scores = squeeze_batch(scores, 1);
        let classes = squeeze_batch(classes, 1);

        if boxes.ndim() != 2 || boxes.shape()[1] != 4 {
            return Err(DetectError::Inference(format!(
                "unexpected boxes shape: {:?}",
                boxes.shape()
            )));
        }
        if scores.ndim() != 1 || classes.ndim() != 1 {
            return Err(DetectError::Inference(format!(
                "unexpected scores/classes shape: {:?} / {:?}",
                scores.shape(),
                classes.shape()
            )));
        }

        let count = boxes.shape()[0].min(scores.len()).min(classes.len());
        let mut raw = RawDetections::default();
        for i in 0..count {
            raw.boxes.push([
                boxes[[i, 0]],
                boxes[[i, 1]],
                boxes[[i, 2]],
                boxes[[i, 3]],
            ]);
            raw.scores.push(scores[[i]]);
            raw.labels.push(self.class_label(classes[[i]] as usize));
        }

        tracing::debug!("Model returned {} detections", raw.len());

        Ok(raw)
    }
}
