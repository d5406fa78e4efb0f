//! The capability surface every cache backend provides

use crate::error::Result;
use crate::types::ByteStream;
use async_trait::async_trait;

/// A blob cache keyed by digest.
///
/// Membership is answered live by the backend on every call; nothing is
/// remembered in process.
#[async_trait]
pub trait BlobCache: Send + Sync {
    /// Whether a blob is stored under `digest`.
    ///
    /// A missing blob is `Ok(false)`, never an error.
    async fn exists(&self, digest: &str) -> Result<bool>;

    /// A time-limited link that retrieves the blob directly from the backend.
    async fn presign(&self, digest: &str) -> Result<String>;

    /// Write `body` under `digest`, attaching a checksum where supported.
    async fn store(&self, digest: &str, body: ByteStream) -> Result<()>;
}
