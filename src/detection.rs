/// Axis-aligned box in normalized `[0, 1]` coordinates, corners ordered
/// top-left then bottom-right, x before y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub top_left: (f32, f32),
    pub bottom_right: (f32, f32),
}

impl NormalizedBox {
    /// The model emits boxes in row-major `[ymin, xmin, ymax, xmax]` order.
    /// Everything downstream works with x-before-y corner pairs, so the swap
    /// happens here and nowhere else.
    pub fn from_yxyx(raw: [f32; 4]) -> Self {
        Self {
            top_left: (raw[1], raw[0]),
            bottom_right: (raw[3], raw[2]),
        }
    }

    /// Scales each corner's x by the image width and y by the image height.
    pub fn to_pixel_rect(&self, width: u32, height: u32) -> PixelRect {
        PixelRect {
            left: self.top_left.0 * width as f32,
            top: self.top_left.1 * height as f32,
            right: self.bottom_right.0 * width as f32,
            bottom: self.bottom_right.1 * height as f32,
        }
    }
}

/// Box mapped into pixel space of a concrete image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: NormalizedBox,
    pub score: f32,
    pub label: String,
}

impl Detection {
    /// Label burned into the image, e.g. `Cat (87%)` for a score of 0.874.
    /// Rounds half away from zero; exact .5% scores land one percent higher
    /// than a round-half-to-even scheme would put them.
    pub fn label_text(&self) -> String {
        format!("{} ({}%)", self.label, (self.score * 100.0).round() as i32)
    }
}

/// The model's full output, untruncated, in its native score-descending
/// order: boxes still in `[ymin, xmin, ymax, xmax]`, one score and one
/// decoded class label per box.
#[derive(Debug, Clone, Default)]
pub struct RawDetections {
    pub boxes: Vec<[f32; 4]>,
    pub scores: Vec<f32>,
    pub labels: Vec<String>,
}

impl RawDetections {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Takes the first `limit` entries as-is. The model already orders by score,
/// so no re-sorting and no score threshold; low-confidence entries come
/// through when `limit` exceeds the number of strong results.
pub fn top_detections(raw: &RawDetections, limit: usize) -> Vec<Detection> {
    raw.boxes
        .iter()
        .zip(&raw.scores)
        .zip(&raw.labels)
        .take(limit)
        .map(|((bbox, score), label)| Detection {
            bbox: NormalizedBox::from_yxyx(*bbox),
            score: *score,
            label: label.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_fixture(count: usize) -> RawDetections {
        let mut raw = RawDetections::default();
        for i in 0..count {
            let offset = i as f32 * 0.01;
            raw.boxes.push([0.1 + offset, 0.2, 0.5, 0.6]);
            raw.scores.push(0.9 - offset);
            raw.labels.push(format!("label{}", i));
        }
        raw
    }

    #[test]
    fn from_yxyx_swaps_axes() {
        let bbox = NormalizedBox::from_yxyx([0.1, 0.2, 0.5, 0.6]);
        assert_eq!(bbox.top_left, (0.2, 0.1));
        assert_eq!(bbox.bottom_right, (0.6, 0.5));
    }

    #[test]
    fn to_pixel_rect_scales_by_image_dimensions() {
        let bbox = NormalizedBox {
            top_left: (0.25, 0.5),
            bottom_right: (0.75, 1.0),
        };
        let rect = bbox.to_pixel_rect(640, 480);
        assert_eq!(rect.left, 160.0);
        assert_eq!(rect.top, 240.0);
        assert_eq!(rect.right, 480.0);
        assert_eq!(rect.bottom, 480.0);
    }

    #[test]
    fn label_text_rounds_score_to_whole_percent() {
        let detection = Detection {
            bbox: NormalizedBox::from_yxyx([0.0, 0.0, 1.0, 1.0]),
            score: 0.874,
            label: "Cat".to_string(),
        };
        assert_eq!(detection.label_text(), "Cat (87%)");

        let detection = Detection {
            score: 0.875,
            ..detection
        };
        assert_eq!(detection.label_text(), "Cat (88%)");
    }

    #[test]
    fn top_detections_takes_first_entries_without_resorting() {
        let mut raw = raw_fixture(5);
        // scramble the scores: selection must not reorder on score
        raw.scores = vec![0.1, 0.9, 0.5, 0.8, 0.2];

        let detections = top_detections(&raw, 3);
        assert_eq!(detections.len(), 3);
        assert_eq!(detections[0].score, 0.1);
        assert_eq!(detections[1].score, 0.9);
        assert_eq!(detections[2].score, 0.5);
        assert_eq!(detections[0].label, "label0");
    }

    #[test]
    fn top_detections_applies_axis_swap() {
        let raw = raw_fixture(1);
        let detections = top_detections(&raw, 3);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox.top_left, (0.2, 0.1));
        assert_eq!(detections[0].bbox.bottom_right, (0.6, 0.5));
    }

    #[test]
    fn top_detections_with_fewer_entries_than_limit() {
        let raw = raw_fixture(2);
        assert_eq!(top_detections(&raw, 3).len(), 2);
    }
}
