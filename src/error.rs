use thiserror::Error;

/// Errors raised while parsing a raw options string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    /// A numeric option (`width`, `h`, `quality`) did not parse as a positive integer
    #[error("Invalid value for '{key}': {value:?} is not a positive integer")]
    InvalidNumber { key: &'static str, value: String },

    /// Quality parsed but fell outside 1-100
    #[error("Invalid quality: {0} (must be 1-100)")]
    QualityOutOfRange(i64),

    /// `fit` was not one of contain, cover, fill, crop
    #[error("Invalid fit mode: {0:?} (expected contain, cover, fill or crop)")]
    InvalidFitMode(String),

    /// An explicit `width` / `h` is above the configured ceiling
    #[error("Invalid value for '{key}': {value} exceeds the maximum of {max}")]
    DimensionTooLarge { key: &'static str, value: u32, max: u32 },
}

/// Errors produced by the transform engine.
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// Source bytes are not a decodable image
    #[error("Failed to decode source image: {message}")]
    Decode { message: String },

    /// Output format is unsupported or the encoder failed
    #[error("Failed to encode {format} image: {message}")]
    Encode { format: String, message: String },

    /// A centered crop box does not fit inside the source
    #[error(
        "Crop box {width}x{height} exceeds source dimensions {source_width}x{source_height}"
    )]
    InvalidCropBounds {
        width: u32,
        height: u32,
        source_width: u32,
        source_height: u32,
    },

    /// A resample size derived from the request is above the ceiling
    #[error("Output size {width}x{height} exceeds the limit of {max}x{max}")]
    OutputTooLarge { width: u32, height: u32, max: u32 },
}

/// Errors from fetching the source image at its origin.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// URL could not be parsed or uses an unsupported scheme
    #[error("Invalid source URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Origin answered with a non-success status
    #[error("Origin returned status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Connection, TLS or body read failure
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// The request did not complete within the deadline
    #[error("Timed out after {timeout_ms}ms fetching {url}")]
    Timeout { url: String, timeout_ms: u64 },

    /// The source body exceeded the configured ceiling
    #[error("Source at {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

/// Errors from a single cache tier.
///
/// These never abort a request: the tier chain logs them and treats the
/// operation as a miss (reads) or a no-op (writes).
#[derive(Debug, Clone, Error)]
pub enum CacheTierError {
    /// Error from Redis
    #[error("Redis error: {0}")]
    Redis(String),

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or body-stream error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The tier call exceeded its deadline
    #[error("Tier operation timed out after {0}ms")]
    Timeout(u64),
}

/// Request-level errors surfaced by the proxy.
///
/// Only [`ProxyError::OriginUnavailable`] has a dedicated HTTP status; every
/// other kind collapses to a generic internal failure at the boundary.
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    /// Malformed numeric option
    #[error("Validation error: {0}")]
    Validation(OptionsError),

    /// Unrecognized fit mode
    #[error("Invalid fit mode: {0}")]
    InvalidFitMode(String),

    /// Crop box larger than the source
    #[error(transparent)]
    InvalidCropBounds(TransformError),

    /// Source bytes are not an image
    #[error(transparent)]
    Decode(TransformError),

    /// Output encoding failed or the format is unsupported
    #[error(transparent)]
    Encode(TransformError),

    /// Resolved output size is above the configured ceiling
    #[error(transparent)]
    OutputTooLarge(TransformError),

    /// Origin fetch failed
    #[error("Origin unavailable: {0}")]
    OriginUnavailable(#[from] FetchError),

    /// Background task failed to complete (panicked)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<OptionsError> for ProxyError {
    fn from(err: OptionsError) -> Self {
        match err {
            OptionsError::InvalidFitMode(value) => ProxyError::InvalidFitMode(value),
            other => ProxyError::Validation(other),
        }
    }
}

impl From<TransformError> for ProxyError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::Decode { .. } => ProxyError::Decode(err),
            TransformError::Encode { .. } => ProxyError::Encode(err),
            TransformError::InvalidCropBounds { .. } => ProxyError::InvalidCropBounds(err),
            TransformError::OutputTooLarge { .. } => ProxyError::OutputTooLarge(err),
        }
    }
}

impl ProxyError {
    /// Short machine-readable name for the error kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Validation(_) => "validation_error",
            ProxyError::InvalidFitMode(_) => "invalid_fit_mode",
            ProxyError::InvalidCropBounds(_) => "invalid_crop_bounds",
            ProxyError::Decode(_) => "decode_error",
            ProxyError::Encode(_) => "encode_error",
            ProxyError::OutputTooLarge(_) => "output_too_large",
            ProxyError::OriginUnavailable(_) => "origin_unavailable",
            ProxyError::Internal(_) => "internal_error",
        }
    }
}
