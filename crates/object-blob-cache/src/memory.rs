//! Process-local cache backend for tests and local development

use crate::cache::BlobCache;
use crate::error::Result;
use crate::types::ByteStream;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Keeps blobs in memory; presigned links are `{base_url}/{digest}`
pub struct MemoryBlobCache {
    base_url: String,
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBlobCache {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, digest: &str) -> Option<Bytes> {
        self.blobs.read().await.get(digest).cloned()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobCache for MemoryBlobCache {
    async fn exists(&self, digest: &str) -> Result<bool> {
        Ok(self.blobs.read().await.contains_key(digest))
    }

    async fn presign(&self, digest: &str) -> Result<String> {
        Ok(format!("{}/{}", self.base_url, digest))
    }

    async fn store(&self, digest: &str, mut body: ByteStream) -> Result<()> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }

        self.blobs
            .write()
            .await
            .insert(digest.to_string(), buf.freeze());
        Ok(())
    }
}
