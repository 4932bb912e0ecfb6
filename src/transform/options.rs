//! Option string parsing.
//!
//! Request options arrive as a single comma-separated list of `key=value`
//! tokens, for example `width=1200,h=800,format=webp,quality=80,fit=crop`.
//!
//! # Rules
//!
//! - Tokens without `=` are ignored, as are unknown keys.
//! - Duplicate keys: the last occurrence wins.
//! - `width` / `h`: `auto` (or absent) derives the value from the source
//!   aspect ratio; otherwise a positive integer.
//! - `quality`: integer in 1-100, default 80.
//! - `format`: lowercased, `jpg` is an alias for `jpeg`, default `webp`.
//!   Not checked here; unknown formats fail at encode time.
//! - `fit`: one of `contain` (default), `cover`, `fill`, `crop`.

use std::fmt;
use std::str::FromStr;

use crate::error::OptionsError;

/// Default output quality.
pub const DEFAULT_QUALITY: u8 = 80;

/// Minimum accepted quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum accepted quality.
pub const MAX_QUALITY: u8 = 100;

/// Default output format token.
pub const DEFAULT_FORMAT: &str = "webp";

/// Default ceiling for an explicit `width` / `h`, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

/// A requested output dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dimension {
    /// Derive from the source aspect ratio
    #[default]
    Auto,
    /// Explicit size in pixels (always > 0)
    Pixels(u32),
}

impl Dimension {
    /// Returns the explicit pixel value, if any.
    pub fn pixels(self) -> Option<u32> {
        match self {
            Dimension::Auto => None,
            Dimension::Pixels(px) => Some(px),
        }
    }

    fn parse(key: &'static str, value: &str) -> Result<Self, OptionsError> {
        if value.eq_ignore_ascii_case("auto") {
            return Ok(Dimension::Auto);
        }

        match value.parse::<u32>() {
            Ok(px) if px > 0 => Ok(Dimension::Pixels(px)),
            _ => Err(OptionsError::InvalidNumber {
                key,
                value: value.to_string(),
            }),
        }
    }
}

/// How the source image is mapped into the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Scale to fit entirely inside the box, preserving aspect ratio
    #[default]
    Contain,
    /// Scale to fill the box, preserving aspect ratio, then center-crop
    Cover,
    /// Resample to exactly the box, ignoring aspect ratio
    Fill,
    /// Take a centered region of the box size without scaling
    Crop,
}

impl FromStr for FitMode {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contain" => Ok(FitMode::Contain),
            "cover" => Ok(FitMode::Cover),
            "fill" => Ok(FitMode::Fill),
            "crop" => Ok(FitMode::Crop),
            other => Err(OptionsError::InvalidFitMode(other.to_string())),
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FitMode::Contain => "contain",
            FitMode::Cover => "cover",
            FitMode::Fill => "fill",
            FitMode::Crop => "crop",
        };
        f.write_str(name)
    }
}

/// Canonical transform parameters for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSpec {
    /// Target width
    pub width: Dimension,

    /// Target height
    pub height: Dimension,

    /// Lowercased output format token (`jpg` already mapped to `jpeg`)
    pub format: String,

    /// Output quality (1-100)
    pub quality: u8,

    /// Fit mode
    pub fit: FitMode,
}

impl Default for TransformSpec {
    fn default() -> Self {
        Self {
            width: Dimension::Auto,
            height: Dimension::Auto,
            format: DEFAULT_FORMAT.to_string(),
            quality: DEFAULT_QUALITY,
            fit: FitMode::Contain,
        }
    }
}

impl TransformSpec {
    /// Parse a raw options string.
    ///
    /// This is a pure function of its input.
    pub fn parse(raw: &str) -> Result<Self, OptionsError> {
        let mut width = None;
        let mut height = None;
        let mut format = None;
        let mut quality = None;
        let mut fit = None;

        // Later tokens overwrite earlier ones
        for (key, value) in tokens(raw) {
            match key {
                "width" => width = Some(value),
                "h" => height = Some(value),
                "format" => format = Some(value),
                "quality" => quality = Some(value),
                "fit" => fit = Some(value),
                _ => {}
            }
        }

        let mut spec = TransformSpec::default();

        if let Some(value) = width {
            spec.width = Dimension::parse("width", value)?;
        }
        if let Some(value) = height {
            spec.height = Dimension::parse("h", value)?;
        }
        if let Some(value) = quality {
            spec.quality = parse_quality(value)?;
        }
        if let Some(value) = format {
            spec.format = normalize_format(value);
        }
        if let Some(value) = fit {
            spec.fit = value.parse()?;
        }

        Ok(spec)
    }

    /// Reject explicit dimensions above `max`.
    ///
    /// `auto` is not checked here since its value depends on the source.
    pub fn check_max_dimension(&self, max: u32) -> Result<(), OptionsError> {
        for (key, dim) in [("width", self.width), ("h", self.height)] {
            if let Some(value) = dim.pixels().filter(|px| *px > max) {
                return Err(OptionsError::DimensionTooLarge { key, value, max });
            }
        }
        Ok(())
    }

    /// Content type for the requested format: `image/<format>`.
    pub fn content_type(&self) -> String {
        format!("image/{}", self.format)
    }
}

/// Iterate over `(key, value)` pairs, skipping tokens without `=`.
pub(crate) fn tokens(raw: &str) -> impl Iterator<Item = (&str, &str)> {
    raw.split(',')
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
}

fn parse_quality(value: &str) -> Result<u8, OptionsError> {
    let parsed: i64 = value.parse().map_err(|_| OptionsError::InvalidNumber {
        key: "quality",
        value: value.to_string(),
    })?;

    if parsed < MIN_QUALITY as i64 || parsed > MAX_QUALITY as i64 {
        return Err(OptionsError::QualityOutOfRange(parsed));
    }

    Ok(parsed as u8)
}

fn normalize_format(value: &str) -> String {
    let lower = value.to_ascii_lowercase();
    if lower == "jpg" {
        "jpeg".to_string()
    } else {
        lower
    }
}
