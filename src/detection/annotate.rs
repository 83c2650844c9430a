use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::models::DetectedRegion;

// Ultralytics default palette, RGB
const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [146, 204, 23],
    [61, 219, 134],
    [26, 147, 52],
    [0, 212, 187],
];

// DejaVu Sans, see assets/DejaVuSans-LICENSE.txt
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

const BOX_THICKNESS: i32 = 2;
const LABEL_HEIGHT: u32 = 18;

pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draws detection boxes and label tabs onto RGB images
pub struct Annotator {
    font: Option<FontArc>,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

impl Default for Annotator {
    fn default() -> Self {
        let font = match FontArc::try_from_slice(BUNDLED_FONT) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("Bundled label font is unusable: {}", e);
                None
            }
        };
        Self { font }
    }
}

impl Annotator {
    /// Annotator using the bundled label font
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a TrueType/OpenType font for label text instead of the bundled one
    pub fn with_font_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| anyhow::anyhow!("Invalid font {:?}: {}", path.as_ref(), e))?;
        Ok(Self { font: Some(font) })
    }

    /// Return a copy of `img` with every region drawn on it
    pub fn annotate(&self, img: &RgbImage, regions: &[DetectedRegion]) -> RgbImage {
        let mut canvas = img.clone();
        let (width, height) = canvas.dimensions();

        for region in regions {
            let color = class_color(region.class_id);
            let bbox = region.bbox.clamp(width, height);
            let x = bbox.x1.round() as i32;
            let y = bbox.y1.round() as i32;
            let w = bbox.width().round() as u32;
            let h = bbox.height().round() as u32;

            for inset in 0..BOX_THICKNESS {
                let inner_w = w.saturating_sub(2 * inset as u32);
                let inner_h = h.saturating_sub(2 * inset as u32);
                if inner_w == 0 || inner_h == 0 {
                    break;
                }
                draw_hollow_rect_mut(
                    &mut canvas,
                    Rect::at(x + inset, y + inset).of_size(inner_w, inner_h),
                    color,
                );
            }

            self.draw_label(&mut canvas, region, x, y, color);
        }

        debug!("Annotated {} regions", regions.len());
        canvas
    }

    fn draw_label(&self, canvas: &mut RgbImage, region: &DetectedRegion, x: i32, y: i32, color: Rgb<u8>) {
        let text = format!("{} {:.2}", region.class_label, region.confidence);
        let scale = PxScale::from(LABEL_HEIGHT as f32 - 2.0);

        let tab_width = match &self.font {
            Some(font) => text_size(scale, font, &text).0 + 4,
            None => (text.len() as u32) * 7,
        };

        // Tab sits above the box, or inside it when the box touches the top edge
        let tab_y = if y >= LABEL_HEIGHT as i32 { y - LABEL_HEIGHT as i32 } else { y };
        draw_filled_rect_mut(canvas, Rect::at(x, tab_y).of_size(tab_width.max(1), LABEL_HEIGHT), color);

        if let Some(font) = &self.font {
            draw_text_mut(canvas, Rgb([255, 255, 255]), x + 2, tab_y + 1, scale, font, &text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    #[test]
    fn annotate_draws_box_edges_without_touching_input() {
        let img = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let region = DetectedRegion {
            class_id: 0,
            class_label: "BlackSpot".to_string(),
            confidence: 0.8,
            bbox: BoundingBox { x1: 20.0, y1: 40.0, x2: 80.0, y2: 90.0 },
        };

        let annotated = Annotator::new().annotate(&img, &[region]);

        assert_eq!(annotated.get_pixel(20, 60), &class_color(0));
        assert_eq!(annotated.get_pixel(50, 89), &class_color(0));
        assert_eq!(annotated.get_pixel(50, 60), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(20, 60), &Rgb([0, 0, 0]));
    }

    #[test]
    fn label_tab_contains_text() {
        let img = RgbImage::from_pixel(200, 200, Rgb([0, 0, 0]));
        let region = DetectedRegion {
            class_id: 0,
            class_label: "BlackSpot".to_string(),
            confidence: 0.8,
            bbox: BoundingBox { x1: 40.0, y1: 60.0, x2: 160.0, y2: 180.0 },
        };

        let annotated = Annotator::new().annotate(&img, &[region]);

        // Tab spans rows 42..60 above the box
        let tab = class_color(0);
        let text_pixels = (42..60)
            .flat_map(|y| (42..130).map(move |x| (x, y)))
            .filter(|&(x, y)| annotated.get_pixel(x, y) != &tab)
            .count();
        assert!(text_pixels > 20, "only {} text pixels in label tab", text_pixels);
        assert_eq!(annotated.get_pixel(41, 50), &tab);
    }
}
