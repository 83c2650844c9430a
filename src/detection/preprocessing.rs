use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::models::BoundingBox;

/// Grey used for letterbox padding, as in Ultralytics
const PAD_VALUE: u8 = 114;

/// Model input prepared from an RGB image
pub struct PreparedInput {
    /// Planar CHW pixel data normalised to 0..=1, length `3 * size * size`
    pub data: Vec<f32>,
    pub size: u32,
    pub letterbox: Letterbox,
}

/// Placement of the source image inside the square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Resize factor applied to the source image
    pub ratio: f32,
    /// Padding added on the left and top, in model pixels
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    /// Map a box in model input coordinates back to source image pixels
    pub fn to_source(&self, bbox: &BoundingBox) -> BoundingBox {
        let px = self.pad_x as f32;
        let py = self.pad_y as f32;
        BoundingBox {
            x1: (bbox.x1 - px) / self.ratio,
            y1: (bbox.y1 - py) / self.ratio,
            x2: (bbox.x2 - px) / self.ratio,
            y2: (bbox.y2 - py) / self.ratio,
        }
    }
}

/// Letterbox into a square model input and convert to normalised CHW floats.
///
/// The aspect ratio is kept; the image is centred and the borders are filled
/// with [`PAD_VALUE`].
pub fn prepare_input(img: &RgbImage, size: u32) -> PreparedInput {
    let (width, height) = img.dimensions();
    let ratio = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_w = ((width as f32 * ratio).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * ratio).round() as u32).clamp(1, size);
    let pad_x = (((size - new_w) as f32 / 2.0) - 0.1).round().max(0.0) as u32;
    let pad_y = (((size - new_h) as f32 / 2.0) - 0.1).round().max(0.0) as u32;

    let resized = imageops::resize(img, new_w, new_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let idx = (y * size + x) as usize;
        for channel in 0..3 {
            data[channel * plane + idx] = pixel[channel] as f32 / 255.0;
        }
    }

    PreparedInput {
        data,
        size,
        letterbox: Letterbox { ratio, pad_x, pad_y },
    }
}
