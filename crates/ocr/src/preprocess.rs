use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("image data is empty")]
    Empty,
    #[error("failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("failed to encode processed image: {0}")]
    Encode(String),
}

/// Decode raw image bytes (JPEG / PNG / WEBP / …).
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, PreprocessError> {
    if data.is_empty() {
        return Err(PreprocessError::Empty);
    }
    Ok(image::load_from_memory(data)?)
}

/// Single-channel 8-bit copy with the same dimensions.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Grayscale, optionally followed by a min/max contrast stretch.
pub fn normalize(img: &DynamicImage, stretch: bool) -> GrayImage {
    let gray = to_grayscale(img);
    if stretch {
        stretch_contrast(gray)
    } else {
        gray
    }
}

/// Map the darkest pixel to 0 and the brightest to 255.
pub fn stretch_contrast(gray: GrayImage) -> GrayImage {
    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px <= min_px {
        // Uniform (or empty) image.
        return gray;
    }

    let range = (max_px - min_px) as u32;
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        Luma([((p - min_px) as u32 * 255 / range) as u8])
    })
}

/// PNG-encode a grayscale bitmap for engines that take encoded bytes.
pub fn encode_png(gray: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(gray.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient_gray(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, _| Luma([(x * 255 / width) as u8]))
    }

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn grayscale_keeps_dimensions() {
        let rgb: RgbImage = ImageBuffer::from_fn(7, 3, |x, _| Rgb([x as u8 * 30, 10, 200]));
        let gray = to_grayscale(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(gray.dimensions(), (7, 3));
    }

    #[test]
    fn grayscale_of_white_is_white() {
        let rgb: RgbImage = ImageBuffer::from_fn(2, 2, |_, _| Rgb([255, 255, 255]));
        let gray = to_grayscale(&DynamicImage::ImageRgb8(rgb));
        assert!(gray.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn uniform_image_survives_stretch() {
        let img: GrayImage = ImageBuffer::from_fn(10, 10, |_, _| Luma([128u8]));
        let result = stretch_contrast(img);
        assert_eq!(result.dimensions(), (10, 10));
        assert!(result.pixels().all(|p| p[0] == 128));
    }

    #[test]
    fn stretch_expands_to_full_range() {
        let narrow: GrayImage = ImageBuffer::from_fn(4, 1, |x, _| Luma([100 + x as u8 * 10]));
        let result = stretch_contrast(narrow);
        let min = result.pixels().map(|p| p[0]).min().unwrap();
        let max = result.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!((min, max), (0, 255));
    }

    #[test]
    fn normalize_without_stretch_is_plain_grayscale() {
        let img = DynamicImage::ImageLuma8(gradient_gray(16, 2));
        assert_eq!(normalize(&img, false), gradient_gray(16, 2));
    }

    #[test]
    fn decode_rejects_empty_and_garbage() {
        assert!(matches!(decode_image(&[]), Err(PreprocessError::Empty)));
        assert!(matches!(decode_image(b"definitely not an image"), Err(PreprocessError::Load(_))));
    }

    #[test]
    fn decode_accepts_png() {
        let bytes = png_bytes(DynamicImage::ImageLuma8(gradient_gray(5, 4)));
        let img = decode_image(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (5, 4));
    }

    #[test]
    fn encode_png_produces_png_header() {
        let result = encode_png(&gradient_gray(4, 4)).unwrap();
        // PNG magic bytes: 0x89 0x50 0x4E 0x47
        assert_eq!(&result[..4], b"\x89PNG");
    }
}
