//! Pixel format conversion to 8-bit luma and blank-frame detection.

use image::ImageFormat;

/// Frames whose total luma is below this are treated as no picture at all.
pub const MIN_LUMA_SUM: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid {format} length: expected {expected}, got {actual}")]
    InvalidLength {
        format: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("MJPEG decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("decoded frame is {actual_w}x{actual_h}, negotiated {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        actual_w: u32,
        actual_h: u32,
    },
}

/// Convert packed YUYV (4:2:2) to grayscale by extracting the Y channel.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            format: "YUYV",
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

/// Native 8-bit grayscale: just trim driver padding.
pub fn grey_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height) as usize;
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            format: "GREY",
            expected,
            actual: buf.len(),
        });
    }
    Ok(buf[..expected].to_vec())
}

/// 16-bit little-endian grayscale, keeping the high byte.
pub fn y16_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    if buf.len() < pixels * 2 {
        return Err(FrameError::InvalidLength {
            format: "Y16",
            expected: pixels * 2,
            actual: buf.len(),
        });
    }
    Ok(buf[..pixels * 2]
        .chunks_exact(2)
        .map(|px| (u16::from_le_bytes([px[0], px[1]]) >> 8) as u8)
        .collect())
}

/// Decode one Motion-JPEG frame to luma.
pub fn mjpeg_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let luma = image::load_from_memory_with_format(buf, ImageFormat::Jpeg)?.to_luma8();
    if luma.width() != width || luma.height() != height {
        return Err(FrameError::SizeMismatch {
            width,
            height,
            actual_w: luma.width(),
            actual_h: luma.height(),
        });
    }
    Ok(luma.into_raw())
}

/// A covered lens or a camera that never delivered light.
pub fn is_blank(gray: &[u8]) -> bool {
    gray.iter().map(|&p| p as u64).sum::<u64>() < MIN_LUMA_SUM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_grayscale() {
        // 2x1 image: [Y0=100, U=128, Y1=200, V=128]
        let yuyv = vec![100, 128, 200, 128];
        let gray = yuyv_to_grayscale(&yuyv, 2, 1).unwrap();
        assert_eq!(gray, vec![100, 200]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let result = yuyv_to_grayscale(&[100, 128], 2, 1);
        assert!(matches!(
            result,
            Err(FrameError::InvalidLength { format: "YUYV", .. })
        ));
    }

    #[test]
    fn test_grey_trims_padding() {
        let gray = grey_to_grayscale(&[1, 2, 3, 4, 99, 99], 2, 2).unwrap();
        assert_eq!(gray, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_y16_keeps_high_byte() {
        // 0x1234 little-endian → [0x34, 0x12] → 0x12
        let gray = y16_to_grayscale(&[0x34, 0x12, 0xff, 0xab], 2, 1).unwrap();
        assert_eq!(gray, vec![0x12, 0xab]);
    }

    #[test]
    fn test_mjpeg_decodes_to_luma() {
        let img = image::GrayImage::from_pixel(8, 4, image::Luma([128u8]));
        let mut jpeg = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .unwrap();

        let gray = mjpeg_to_grayscale(jpeg.get_ref(), 8, 4).unwrap();
        assert_eq!(gray.len(), 32);
        assert!(gray.iter().all(|&p| (p as i32 - 128).abs() <= 2));

        assert!(matches!(
            mjpeg_to_grayscale(jpeg.get_ref(), 16, 16),
            Err(FrameError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_mjpeg_garbage_is_error() {
        assert!(mjpeg_to_grayscale(&[0, 1, 2, 3], 2, 2).is_err());
    }

    #[test]
    fn test_blank_frame() {
        assert!(is_blank(&[0u8; 10_000]));
        assert!(is_blank(&[1u8; 999]));
        assert!(!is_blank(&[1u8; 1000]));
    }
}
