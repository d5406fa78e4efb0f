//! Cache types

use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;

/// Byte stream handed to [`crate::BlobCache::store`].
///
/// An `Err` item means the producer failed; backends abort the write instead
/// of persisting a truncated blob.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Lifetime of a presigned retrieval link unless configured otherwise
pub const DEFAULT_PRESIGN_EXPIRATION: Duration = Duration::from_secs(5 * 60);

/// Endpoint used when `use_local_endpoint` is set (LocalStack default)
pub const LOCAL_ENDPOINT: &str = "http://localhost:4566";

/// Signing region for the local endpoint
pub const LOCAL_REGION: &str = "us-east-1";

/// Settings for the S3 binding
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    /// Talk to a local S3-compatible endpoint instead of AWS
    pub use_local_endpoint: bool,
    pub local_endpoint: String,
    pub local_region: String,
}

impl S3Settings {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            bucket: "sample-bucket".to_string(),
            use_local_endpoint: false,
            local_endpoint: LOCAL_ENDPOINT.to_string(),
            local_region: LOCAL_REGION.to_string(),
        }
    }
}
