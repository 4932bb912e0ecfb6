//! Cache key derivation.
//!
//! A key is the SHA-256 digest of `source_url + "|" + raw_options`, rendered
//! as 64 lowercase hex characters, plus a file extension taken from the
//! `format=` token of the raw options.
//!
//! The raw options string is hashed as-is. Reordering or duplicating tokens
//! produces a different key even when the parsed [`TransformSpec`] is the
//! same.
//!
//! [`TransformSpec`]: crate::transform::TransformSpec

use std::fmt;

use sha2::{Digest, Sha256};

use crate::transform::{tokens, DEFAULT_FORMAT};

/// Length of the hex digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Separator between the source URL and the options in the hashed input.
const KEY_SEPARATOR: &str = "|";

/// Deterministic cache key for one (source URL, raw options) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
    extension: String,
}

impl CacheKey {
    /// Hex digest part of the key.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// File extension part of the key.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Object name under `prefix`, e.g. `optimized/<hex>.webp`.
    pub fn object_key(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.digest, self.extension)
    }
}

/// Derive the cache key for a request.
///
/// # Example
///
/// ```
/// use img_proxy::cache::derive_key;
///
/// let key = derive_key("https://example.com/cat.jpg", "width=300,format=png");
/// assert_eq!(key.extension(), "png");
/// assert_eq!(key.digest().len(), 64);
/// ```
pub fn derive_key(source_url: &str, raw_options: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(source_url.as_bytes());
    hasher.update(KEY_SEPARATOR.as_bytes());
    hasher.update(raw_options.as_bytes());

    CacheKey {
        digest: hex::encode(hasher.finalize()),
        extension: key_extension(raw_options),
    }
}

/// Extension from the last `format=` token, falling back to the default
/// format when absent or not a plain alphanumeric word.
fn key_extension(raw_options: &str) -> String {
    let raw = tokens(raw_options)
        .filter(|(key, _)| *key == "format")
        .map(|(_, value)| value)
        .last();

    match raw {
        Some(value) if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()) => {
            value.to_string()
        }
        _ => DEFAULT_FORMAT.to_string(),
    }
}
