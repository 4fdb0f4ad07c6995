//! Decode, resize and re-encode of a single source image.
//!
//! The source is always decoded into RGB8 and resized with one fixed filter;
//! the output format comes from the [`EncoderChoice`] picked for the object.

use std::io::Cursor;

use image::{imageops::FilterType, DynamicImage, ImageError};
use thiserror::Error;
use tracing::debug;

use crate::encoder::EncoderChoice;

const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DimensionError {
    #[error("thumbnail width {target} exceeds source width {source_width}; upscaling is not supported")]
    TargetWiderThanSource { target: u32, source_width: u32 },
    #[error("image dimensions must be positive (source {width}x{height}, target width {target})")]
    Empty { width: u32, height: u32, target: u32 },
}

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("failed to decode source image: {0}")]
    Decode(#[source] ImageError),
    #[error("failed to encode thumbnail: {0}")]
    Encode(#[source] ImageError),
    #[error(transparent)]
    Dimensions(#[from] DimensionError),
}

/// Output size for a thumbnail `target_width` pixels wide.
///
/// The scale divisor is `width / target_width` using integer division, and the
/// height is `height / divisor` rounded half away from zero. Heights that would
/// round to zero are clamped to one pixel.
pub fn target_dimensions(width: u32, height: u32, target_width: u32) -> Result<(u32, u32), DimensionError> {
    if width == 0 || height == 0 || target_width == 0 {
        return Err(DimensionError::Empty { width, height, target: target_width });
    }
    if target_width > width {
        return Err(DimensionError::TargetWiderThanSource { target: target_width, source_width: width });
    }
    let divisor = width / target_width;
    let target_height = (f64::from(height) / f64::from(divisor)).round() as u32;
    Ok((target_width, target_height.max(1)))
}

/// Encoded thumbnail ready for upload.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

pub struct ThumbnailProcessor {
    target_width: u32,
    encoder: EncoderChoice,
}

impl ThumbnailProcessor {
    pub fn new(target_width: u32, encoder: EncoderChoice) -> Self {
        Self { target_width, encoder }
    }

    /// CPU-bound; callers on the async runtime should go through `spawn_blocking`.
    pub fn process(&self, source: &[u8]) -> Result<Thumbnail, ThumbnailError> {
        let rgb = image::load_from_memory(source).map_err(ThumbnailError::Decode)?.to_rgb8();
        let (source_width, source_height) = rgb.dimensions();

        let (width, height) = target_dimensions(source_width, source_height, self.target_width)?;
        debug!(source_width, source_height, width, height, "resizing");

        let resized = image::imageops::resize(&rgb, width, height, RESIZE_FILTER);
        drop(rgb);

        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(resized)
            .write_to(&mut Cursor::new(&mut bytes), self.encoder.image_format())
            .map_err(ThumbnailError::Encode)?;

        Ok(Thumbnail { bytes, width, height, source_width, source_height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, Rgba};

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128u8]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut out), format).unwrap();
        out
    }

    #[test]
    fn divisor_uses_integer_division() {
        assert_eq!(target_dimensions(400, 300, 100), Ok((100, 75)));
        // 450 / 100 = 4, 300 / 4 = 75
        assert_eq!(target_dimensions(450, 300, 100), Ok((100, 75)));
        // 1000 / 300 = 3, 500 / 3 = 166.67
        assert_eq!(target_dimensions(1000, 500, 300), Ok((300, 167)));
        // 10 / 4 = 2, 5 / 2 = 2.5 rounds away from zero
        assert_eq!(target_dimensions(10, 5, 4), Ok((4, 3)));
    }

    #[test]
    fn same_width_keeps_height() {
        assert_eq!(target_dimensions(640, 480, 640), Ok((640, 480)));
    }

    #[test]
    fn wider_target_is_rejected() {
        assert_eq!(
            target_dimensions(80, 60, 100),
            Err(DimensionError::TargetWiderThanSource { target: 100, source_width: 80 })
        );
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(matches!(target_dimensions(0, 10, 1), Err(DimensionError::Empty { .. })));
        assert!(matches!(target_dimensions(10, 10, 0), Err(DimensionError::Empty { .. })));
    }

    #[test]
    fn very_flat_images_keep_one_row() {
        assert_eq!(target_dimensions(1000, 1, 10), Ok((10, 1)));
    }

    #[test]
    fn png_thumbnail_has_computed_size() {
        let processor = ThumbnailProcessor::new(100, EncoderChoice::Png);
        let thumb = processor.process(&encoded(400, 300, ImageFormat::Png)).unwrap();
        assert_eq!((thumb.width, thumb.height), (100, 75));
        assert_eq!((thumb.source_width, thumb.source_height), (400, 300));

        let decoded = image::load_from_memory_with_format(&thumb.bytes, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 75));
    }

    #[test]
    fn jpeg_and_gif_outputs_decode_with_their_format() {
        let jpeg = ThumbnailProcessor::new(50, EncoderChoice::Jpeg)
            .process(&encoded(200, 120, ImageFormat::Jpeg))
            .unwrap();
        let decoded = image::load_from_memory_with_format(&jpeg.bytes, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 30));

        let gif = ThumbnailProcessor::new(30, EncoderChoice::Gif)
            .process(&encoded(90, 45, ImageFormat::Gif))
            .unwrap();
        let decoded = image::load_from_memory_with_format(&gif.bytes, ImageFormat::Gif).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 15));
    }

    #[test]
    fn alpha_sources_are_flattened_to_rgb() {
        let img = ImageBuffer::from_pixel(40, 40, Rgba([10u8, 20, 30, 0]));
        let mut src = Vec::new();
        DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut src), ImageFormat::Png).unwrap();

        let thumb = ThumbnailProcessor::new(20, EncoderChoice::Png).process(&src).unwrap();
        let decoded = image::load_from_memory(&thumb.bytes).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn output_is_deterministic() {
        let src = encoded(300, 200, ImageFormat::Png);
        let processor = ThumbnailProcessor::new(100, EncoderChoice::Jpeg);
        let a = processor.process(&src).unwrap();
        let b = processor.process(&src).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = ThumbnailProcessor::new(10, EncoderChoice::Png).process(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ThumbnailError::Decode(_)));
    }

    #[test]
    fn small_source_reports_dimension_error() {
        let err = ThumbnailProcessor::new(500, EncoderChoice::Png)
            .process(&encoded(100, 100, ImageFormat::Png))
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::Dimensions(DimensionError::TargetWiderThanSource { .. })));
    }
}
