//! Image transform layer.
//!
//! Turns a raw options string into a [`TransformSpec`] and applies it to
//! source image bytes.
//!
//! # Pipeline
//!
//! ```text
//!  "width=800,format=webp,fit=cover"      source bytes
//!                 │                            │
//!                 ▼                            ▼
//! ┌───────────────────────────┐   ┌─────────────────────────┐
//! │  TransformSpec::parse     │──▶│  TransformEngine        │
//! │  (width, h, format,       │   │  decode → resolve box → │
//! │   quality, fit)           │   │  normalize → fit →      │
//! └───────────────────────────┘   │  encode                 │
//!                                 └────────────┬────────────┘
//!                                              │
//!                                              ▼
//!                                     TransformOutput
//! ```
//!
//! # Components
//!
//! - [`TransformSpec`]: canonical parameters for one request
//! - [`FitMode`]: contain / cover / fill / crop
//! - [`TransformEngine`]: stateless decode → fit → encode pipeline
//! - [`OutputFormat`]: supported encoders (jpeg, png, webp)
//! - `geometry`: pure dimension math shared by the fit modes
//!
//! # Example
//!
//! ```
//! use img_proxy::transform::{FitMode, TransformSpec};
//!
//! let spec = TransformSpec::parse("width=500,h=500,fit=crop").unwrap();
//! assert_eq!(spec.fit, FitMode::Crop);
//! assert_eq!(spec.format, "webp");
//! ```

mod encoder;
mod engine;
pub mod geometry;
mod options;

pub use encoder::{encode, OutputFormat};
pub use engine::{TransformEngine, TransformOutput};
pub use options::{
    Dimension, FitMode, TransformSpec, DEFAULT_FORMAT, DEFAULT_MAX_DIMENSION, DEFAULT_QUALITY,
    MAX_QUALITY, MIN_QUALITY,
};
pub(crate) use options::tokens;
