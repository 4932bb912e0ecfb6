//! External I/O: origin fetching and S3 client construction.

mod origin;
mod s3_client;

pub use origin::{
    parse_source_url, HttpOriginFetcher, OriginFetcher, OriginResponse, DEFAULT_MAX_ORIGIN_BYTES,
    DEFAULT_ORIGIN_TIMEOUT,
};
pub use s3_client::create_s3_client;
