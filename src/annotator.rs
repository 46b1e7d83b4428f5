use crate::{
    config::FontConfig,
    detection::{Detection, PixelRect},
};
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const STROKE_WIDTH: i32 = 5;

/// Burns bounding boxes and labels into a decoded image. The font is loaded
/// once at startup and shared read-only across invocations.
pub struct Annotator {
    font: FontArc,
    scale: PxScale,
}

impl Annotator {
    pub fn from_config(config: &FontConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let font_data = std::fs::read(&config.font_file)?;
        let font = FontArc::try_from_vec(font_data)?;

        tracing::info!("Loaded font from {:?}", config.font_file);

        Ok(Self {
            font,
            scale: PxScale::from(config.size),
        })
    }

    /// Draws detections in the order received; later boxes and labels overlap
    /// earlier ones when they collide.
    pub fn annotate(&self, image: &mut RgbImage, detections: &[Detection]) {
        for detection in detections {
            let rect = detection
                .bbox
                .to_pixel_rect(image.width(), image.height());

            draw_box_outline(image, &rect, BOX_COLOR, STROKE_WIDTH);
            self.draw_label(image, &rect, &detection.label_text());
        }
    }

    /// Label background is a filled rectangle of exactly the text's rendered
    /// footprint, anchored at the box's upper-left corner; the text itself is
    /// drawn at the same anchor.
    fn draw_label(&self, image: &mut RgbImage, rect: &PixelRect, label: &str) {
        let x = rect.left as i32;
        let y = rect.top as i32;

        let (text_width, text_height) = text_size(self.scale, &self.font, label);
        if text_width > 0 && text_height > 0 {
            let background = Rect::at(x, y).of_size(text_width as u32, text_height as u32);
            draw_filled_rect_mut(image, background, BOX_COLOR);
        }

        draw_text_mut(image, TEXT_COLOR, x, y, self.scale, &self.font, label);
    }
}

/// A thick outline as nested one-pixel hollow rectangles; imageproc clips
/// anything falling outside the image.
fn draw_box_outline(image: &mut RgbImage, rect: &PixelRect, color: Rgb<u8>, stroke: i32) {
    let x0 = rect.left as i32;
    let y0 = rect.top as i32;
    let x1 = rect.right as i32;
    let y1 = rect.bottom as i32;

    for inset in 0..stroke {
        let width = (x1 - x0 - 2 * inset).max(1) as u32;
        let height = (y1 - y0 - 2 * inset).max(1) as u32;
        let ring = Rect::at(x0 + inset, y0 + inset).of_size(width, height);
        draw_hollow_rect_mut(image, ring, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn outline_covers_stroke_width() {
        let mut image = RgbImage::from_pixel(100, 100, BLACK);
        let rect = PixelRect {
            left: 10.0,
            top: 10.0,
            right: 50.0,
            bottom: 50.0,
        };

        draw_box_outline(&mut image, &rect, BOX_COLOR, 5);

        // all five rings on the top edge are colored
        for inset in 0..5 {
            assert_eq!(*image.get_pixel(30, 10 + inset), BOX_COLOR);
        }
        // interior and exterior untouched
        assert_eq!(*image.get_pixel(30, 30), BLACK);
        assert_eq!(*image.get_pixel(30, 9), BLACK);
        // left edge colored at mid-height
        assert_eq!(*image.get_pixel(10, 30), BOX_COLOR);
    }

    #[test]
    fn outline_clips_outside_image() {
        let mut image = RgbImage::from_pixel(20, 20, BLACK);
        let rect = PixelRect {
            left: -5.0,
            top: -5.0,
            right: 40.0,
            bottom: 40.0,
        };

        // must not panic; nothing visible changes inside the canvas interior
        draw_box_outline(&mut image, &rect, BOX_COLOR, 5);
        assert_eq!(*image.get_pixel(10, 10), BLACK);
    }

    #[test]
    fn degenerate_box_still_draws_a_point() {
        let mut image = RgbImage::from_pixel(20, 20, BLACK);
        let rect = PixelRect {
            left: 5.0,
            top: 5.0,
            right: 5.0,
            bottom: 5.0,
        };

        draw_box_outline(&mut image, &rect, BOX_COLOR, 2);
        assert_eq!(*image.get_pixel(5, 5), BOX_COLOR);
    }
}
