//! Raw camera buffer → RGB conversion.

use image::{ImageFormat, RgbImage};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("MJPEG decode failed: {0}")]
    Mjpeg(#[from] image::ImageError),
}

/// Convert packed YUYV (4:2:2) to RGB using BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, ConvertError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(ConvertError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    to_image(rgb, width, height)
}

/// Replicate an 8-bit grayscale buffer into RGB.
pub fn grey_to_rgb(grey: &[u8], width: u32, height: u32) -> Result<RgbImage, ConvertError> {
    let expected = (width * height) as usize;
    if grey.len() < expected {
        return Err(ConvertError::InvalidLength {
            expected,
            actual: grey.len(),
        });
    }
    let rgb = grey[..expected].iter().flat_map(|&g| [g, g, g]).collect();
    to_image(rgb, width, height)
}

/// Copy a packed RGB24 buffer.
pub fn rgb24_to_rgb(buf: &[u8], width: u32, height: u32) -> Result<RgbImage, ConvertError> {
    let expected = (width * height * 3) as usize;
    if buf.len() < expected {
        return Err(ConvertError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    to_image(buf[..expected].to_vec(), width, height)
}

/// Decode a single MJPEG frame.
pub fn mjpeg_to_rgb(buf: &[u8]) -> Result<RgbImage, ConvertError> {
    Ok(image::load_from_memory_with_format(buf, ImageFormat::Jpeg)?.to_rgb8())
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as f32 - 16.0;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;
    let clamp = |x: f32| x.round().clamp(0.0, 255.0) as u8;
    [
        clamp(1.164 * c + 1.596 * e),
        clamp(1.164 * c - 0.392 * d - 0.813 * e),
        clamp(1.164 * c + 2.017 * d),
    ]
}

fn to_image(rgb: Vec<u8>, width: u32, height: u32) -> Result<RgbImage, ConvertError> {
    let actual = rgb.len();
    RgbImage::from_raw(width, height, rgb).ok_or(ConvertError::InvalidLength {
        expected: (width * height * 3) as usize,
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_neutral_chroma_is_grey() {
        // 2x1 image: [Y0=16 (black), U=128, Y1=235 (white), V=128]
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_yuyv_red_chroma() {
        // High V pushes red up and green down.
        let rgb = yuyv_to_rgb(&[81, 90, 81, 240], 2, 1).unwrap();
        let [r, g, b] = rgb.get_pixel(0, 0).0;
        assert!(r > 200 && g < 60 && b < 60, "got {r},{g},{b}");
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(matches!(
            yuyv_to_rgb(&[100, 128], 2, 1),
            Err(ConvertError::InvalidLength { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_grey_replicates_channels() {
        let rgb = grey_to_rgb(&[7, 200], 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [7, 7, 7]);
        assert_eq!(rgb.get_pixel(1, 0).0, [200, 200, 200]);
        assert!(grey_to_rgb(&[1], 2, 1).is_err());
    }

    #[test]
    fn test_rgb24_copy_ignores_padding() {
        let rgb = rgb24_to_rgb(&[1, 2, 3, 4, 5, 6, 99], 2, 1).unwrap();
        assert_eq!(rgb.into_raw(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_mjpeg_roundtrip_dimensions() {
        let src = RgbImage::from_pixel(8, 4, image::Rgb([10, 20, 30]));
        let mut jpeg = Vec::new();
        src.write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();
        assert_eq!(mjpeg_to_rgb(&jpeg).unwrap().dimensions(), (8, 4));
        assert!(mjpeg_to_rgb(b"garbage").is_err());
    }
}
