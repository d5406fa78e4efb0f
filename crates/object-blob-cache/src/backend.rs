//! Object store backed cache
//!
//! Blobs are written with multipart uploads so memory stays bounded by the
//! part size regardless of blob size, and presigned links come from the
//! store's own URL signer.

use crate::cache::BlobCache;
use crate::error::{CacheError, Result};
use crate::types::{ByteStream, S3Settings};
use async_trait::async_trait;
use futures::StreamExt;
use object_store::aws::{AmazonS3Builder, Checksum};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{ObjectStore, WriteMultipart};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Parts allowed in flight before the upload stops pulling from the stream
const MAX_INFLIGHT_PARTS: usize = 4;

/// Blob cache over any [`ObjectStore`] paired with a URL [`Signer`]
pub struct ObjectStoreCache {
    store: Arc<dyn ObjectStore>,
    signer: Arc<dyn Signer>,
    presign_expiration: Duration,
}

impl ObjectStoreCache {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        signer: Arc<dyn Signer>,
        presign_expiration: Duration,
    ) -> Self {
        Self {
            store,
            signer,
            presign_expiration,
        }
    }

    /// Build the S3 binding.
    ///
    /// Credentials and region come from the standard `AWS_*` environment
    /// variables. Requests use path-style addressing and SHA-256 checksums.
    pub fn s3(settings: &S3Settings, presign_expiration: Duration) -> Result<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(settings.bucket.as_str())
            .with_virtual_hosted_style_request(false)
            .with_checksum_algorithm(Checksum::SHA256);

        if settings.use_local_endpoint {
            builder = builder
                .with_endpoint(settings.local_endpoint.as_str())
                .with_region(settings.local_region.as_str())
                .with_allow_http(true);
        }

        let s3 = Arc::new(
            builder
                .build()
                .map_err(|e| CacheError::Config(format!("Invalid S3 configuration: {}", e)))?,
        );

        Ok(Self::new(s3.clone(), s3, presign_expiration))
    }

    pub fn presign_expiration(&self) -> Duration {
        self.presign_expiration
    }

    /// Check that the bucket is reachable with the configured credentials.
    ///
    /// Lists at most the first entry; an empty bucket is fine.
    pub async fn verify(&self) -> Result<()> {
        let mut listing = self.store.list(None);
        if let Some(entry) = listing.next().await {
            entry?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobCache for ObjectStoreCache {
    async fn exists(&self, digest: &str) -> Result<bool> {
        match self.store.head(&Path::from(digest)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => {
                debug!(digest, "Blob not in object store");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn presign(&self, digest: &str) -> Result<String> {
        let url = self
            .signer
            .signed_url(
                http::Method::GET,
                &Path::from(digest),
                self.presign_expiration,
            )
            .await
            .map_err(|e| CacheError::Presign(e.to_string()))?;
        Ok(url.to_string())
    }

    async fn store(&self, digest: &str, mut body: ByteStream) -> Result<()> {
        let location = Path::from(digest);
        let upload = self.store.put_multipart(&location).await?;
        let mut writer = WriteMultipart::new(upload);
        let mut size = 0usize;

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    abort_upload(writer, digest).await;
                    return Err(e.into());
                }
            };

            if let Err(e) = writer.wait_for_capacity(MAX_INFLIGHT_PARTS).await {
                abort_upload(writer, digest).await;
                return Err(e.into());
            }

            size += chunk.len();
            writer.put(chunk);
        }

        writer.finish().await?;
        debug!(digest, size, "Stored blob");
        Ok(())
    }
}

async fn abort_upload(writer: WriteMultipart, digest: &str) {
    if let Err(e) = writer.abort().await {
        warn!(digest, error = %e, "Failed to abort multipart upload");
    }
}
