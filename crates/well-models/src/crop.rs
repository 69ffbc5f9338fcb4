//! Face boxes and square crops resized for model input.

use image::imageops::{self, FilterType};
use image::GrayImage;

/// Face bounding box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Resize a whole grayscale frame to `out_w`x`out_h`.
pub fn resize(frame: &[u8], width: u32, height: u32, out_w: u32, out_h: u32) -> Option<Vec<u8>> {
    let img = GrayImage::from_raw(width, height, frame.to_vec())?;
    Some(imageops::resize(&img, out_w, out_h, FilterType::Triangle).into_raw())
}

/// Square crop centred on `face`, grown by `margin` (0.1 = 10%), resized to `size`x`size`.
///
/// Returns `None` if the frame buffer does not match its dimensions or the
/// box lies outside the frame.
pub fn crop_square(
    frame: &[u8],
    width: u32,
    height: u32,
    face: &BoundingBox,
    margin: f32,
    size: u32,
) -> Option<Vec<u8>> {
    let img = GrayImage::from_raw(width, height, frame.to_vec())?;

    let side = face.width.max(face.height) * (1.0 + margin);
    let cx = face.x + face.width / 2.0;
    let cy = face.y + face.height / 2.0;

    let x0 = (cx - side / 2.0).max(0.0) as u32;
    let y0 = (cy - side / 2.0).max(0.0) as u32;
    if x0 >= width || y0 >= height {
        return None;
    }
    let w = (side as u32).min(width - x0).max(1);
    let h = (side as u32).min(height - y0).max(1);

    let cropped = imageops::crop_imm(&img, x0, y0, w, h).to_image();
    Some(imageops::resize(&cropped, size, size, FilterType::Triangle).into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_crop_output_size() {
        let frame = vec![100u8; 64 * 48];
        let crop = crop_square(&frame, 64, 48, &face(10.0, 10.0, 20.0, 24.0), 0.1, 112).unwrap();
        assert_eq!(crop.len(), 112 * 112);
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = vec![7u8; 32 * 32];
        let crop = crop_square(&frame, 32, 32, &face(-10.0, -10.0, 60.0, 60.0), 0.2, 16).unwrap();
        assert_eq!(crop.len(), 16 * 16);
        assert!(crop.iter().all(|&p| p == 7));
    }

    #[test]
    fn test_crop_outside_frame() {
        let frame = vec![0u8; 16 * 16];
        assert!(crop_square(&frame, 16, 16, &face(40.0, 40.0, 4.0, 4.0), 0.0, 8).is_none());
    }

    #[test]
    fn test_crop_rejects_short_buffer() {
        assert!(crop_square(&[0u8; 10], 16, 16, &face(0.0, 0.0, 4.0, 4.0), 0.0, 8).is_none());
    }

    #[test]
    fn test_resize() {
        let out = resize(&vec![50u8; 40 * 30], 40, 30, 20, 15).unwrap();
        assert_eq!(out.len(), 300);
    }
}
