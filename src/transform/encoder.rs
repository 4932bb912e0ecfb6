//! Output encoders.
//!
//! JPEG and PNG go through the `image` codecs; WebP is encoded lossy via
//! libwebp so that `quality` has an effect. PNG is lossless and ignores
//! `quality`.

use std::fmt;
use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use super::options::{MAX_QUALITY, MIN_QUALITY};
use crate::error::TransformError;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    /// Resolve a normalized format token (`jpeg`, `png`, `webp`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::WebP),
            _ => None,
        }
    }

    /// Canonical token, also used as the MIME subtype.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    /// MIME type for this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
        }
    }

    /// Whether this format can carry an alpha channel through our pipeline.
    pub fn keeps_alpha(&self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode `img` as `format`.
///
/// `quality` is clamped to 1-100 and ignored by PNG.
pub fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Bytes, TransformError> {
    let quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);
    let encode_err = |message: String| TransformError::Encode {
        format: format.to_string(),
        message,
    };

    let mut output = Vec::new();

    match format {
        OutputFormat::Jpeg => {
            let rgb = img.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);
            encoder
                .encode_image(&rgb)
                .map_err(|e| encode_err(e.to_string()))?;
        }
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
                .map_err(|e| encode_err(e.to_string()))?;
        }
        OutputFormat::WebP => {
            let encoded = match img {
                DynamicImage::ImageRgba8(rgba) => {
                    webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
                        .encode_simple(false, quality as f32)
                }
                other => {
                    let rgb = other.to_rgb8();
                    webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
                        .encode_simple(false, quality as f32)
                }
            }
            .map_err(|e| encode_err(format!("{:?}", e)))?;
            output.extend_from_slice(&encoded);
        }
    }

    Ok(Bytes::from(output))
}
