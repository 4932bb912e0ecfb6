//! Decode → fit → encode pipeline.
//!
//! # Color handling
//!
//! The decoded image is normalized to 8-bit RGB before resampling. PNG
//! output is the exception: it is normalized to RGBA so transparent sources
//! keep their alpha channel.

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};

use super::encoder::{encode, OutputFormat};
use super::geometry::{centered_crop, contain_size, cover_size, resolve_box, Size};
use super::options::{FitMode, TransformSpec, DEFAULT_MAX_DIMENSION};
use crate::error::TransformError;

/// Resampling filter used for every resize.
const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Result of a transform.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Encoded image bytes
    pub data: Bytes,

    /// MIME type of `data`
    pub content_type: &'static str,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,
}

/// Image transform engine.
///
/// Holds only the output size ceiling, so it is cheap to copy into blocking
/// tasks.
#[derive(Debug, Clone, Copy)]
pub struct TransformEngine {
    max_dimension: u32,
}

impl TransformEngine {
    /// Create a transform engine with the default size ceiling.
    pub fn new() -> Self {
        Self::with_max_dimension(DEFAULT_MAX_DIMENSION)
    }

    /// Create a transform engine with a custom size ceiling.
    ///
    /// No resample size may exceed `max_dimension` on an axis unless the
    /// source is already that large on the same axis.
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    /// Largest explicit dimension accepted, in pixels.
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Decode `source`, apply `spec`, and encode the result.
    ///
    /// # Errors
    ///
    /// - [`TransformError::Decode`] if `source` is not a decodable image
    /// - [`TransformError::Encode`] if the format is unsupported or encoding fails
    /// - [`TransformError::InvalidCropBounds`] if `fit=crop` asks for a box
    ///   larger than the source
    /// - [`TransformError::OutputTooLarge`] if the target box or a resample
    ///   size is above the ceiling
    pub fn transform(
        &self,
        source: &[u8],
        spec: &TransformSpec,
    ) -> Result<TransformOutput, TransformError> {
        let img = decode(source)?;

        let format = OutputFormat::from_token(&spec.format).ok_or_else(|| {
            TransformError::Encode {
                format: spec.format.clone(),
                message: "unsupported output format".to_string(),
            }
        })?;

        let source_size = (img.width(), img.height());
        let target = resolve_box(source_size, spec.width, spec.height);
        self.check_size(source_size, target)?;

        let img = normalize(img, format);
        let img = self.apply_fit(img, spec.fit, target)?;

        let data = encode(&img, format, spec.quality)?;

        Ok(TransformOutput {
            data,
            content_type: format.content_type(),
            width: img.width(),
            height: img.height(),
        })
    }

    /// Per axis, a size may reach the larger of the ceiling and the source.
    fn check_size(&self, source: Size, size: Size) -> Result<(), TransformError> {
        let limit_w = self.max_dimension.max(source.0);
        let limit_h = self.max_dimension.max(source.1);

        if size.0 > limit_w || size.1 > limit_h {
            return Err(TransformError::OutputTooLarge {
                width: size.0,
                height: size.1,
                max: self.max_dimension,
            });
        }
        Ok(())
    }

    fn resize_to(&self, img: DynamicImage, size: Size) -> Result<DynamicImage, TransformError> {
        let source = (img.width(), img.height());
        if source == size {
            return Ok(img);
        }

        self.check_size(source, size)?;
        Ok(img.resize_exact(size.0, size.1, RESIZE_FILTER))
    }

    fn apply_fit(
        &self,
        img: DynamicImage,
        fit: FitMode,
        target: Size,
    ) -> Result<DynamicImage, TransformError> {
        let source = (img.width(), img.height());

        match fit {
            FitMode::Contain => self.resize_to(img, contain_size(source, target)),
            FitMode::Fill => self.resize_to(img, target),
            FitMode::Cover => {
                let scaled = self.resize_to(img, cover_size(source, target))?;
                crop_centered(scaled, target)
            }
            FitMode::Crop => crop_centered(img, target),
        }
    }
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(e: impl ToString) -> TransformError {
    TransformError::Decode {
        message: e.to_string(),
    }
}

fn decode(source: &[u8]) -> Result<DynamicImage, TransformError> {
    ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(decode_error)?
        .decode()
        .map_err(decode_error)
}

fn normalize(img: DynamicImage, format: OutputFormat) -> DynamicImage {
    if format.keeps_alpha() {
        match img {
            DynamicImage::ImageRgba8(_) => img,
            other => DynamicImage::ImageRgba8(other.to_rgba8()),
        }
    } else {
        match img {
            DynamicImage::ImageRgb8(_) => img,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        }
    }
}

fn crop_centered(img: DynamicImage, target: Size) -> Result<DynamicImage, TransformError> {
    let source = (img.width(), img.height());
    let rect = centered_crop(source, target).ok_or(TransformError::InvalidCropBounds {
        width: target.0,
        height: target.1,
        source_width: source.0,
        source_height: source.1,
    })?;

    if (rect.width, rect.height) == source {
        return Ok(img);
    }

    Ok(img.crop_imm(rect.x, rect.y, rect.width, rect.height))
}
