//! Proxy configuration, read once from the environment at start-up

use crate::error::{ProxyError, Result};
use object_blob_cache::{S3Settings, DEFAULT_PRESIGN_EXPIRATION};
use std::time::Duration;
use url::Url;

const DEFAULT_LISTEN_ADDR: &str = ":7777";
const DEFAULT_BUCKET: &str = "sample-bucket";
const DEFAULT_UPSTREAM_URL: &str = "http://localhost:7000";
const DEFAULT_BLOB_MARKER: &str = "blobs";

/// Configuration for the proxy
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to bind, always in `host:port` form
    pub listen_addr: String,
    pub bucket: String,
    pub upstream_url: Url,
    /// Keep the client's Host header on fallback requests
    pub preserve_host: bool,
    /// Use the local S3-compatible endpoint instead of AWS
    pub use_localstack: bool,
    pub presign_expiration: Duration,
    /// Path segment that precedes a blob digest
    pub blob_marker: String,
}

impl ProxyConfig {
    /// Read configuration from `BLOBLO_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let listen_addr = normalize_listen_addr(
            &var("BLOBLO_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
        );

        let bucket = var("BLOBLO_S3_BUCKET_NAME").unwrap_or_else(|| DEFAULT_BUCKET.to_string());

        let raw_upstream =
            var("BLOBLO_UPSTREAM_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());
        let upstream_url = parse_upstream_url(&raw_upstream)?;

        let preserve_host = var("BLOBLO_PRESERVE_HOST").as_deref() == Some("true");
        let use_localstack = var("BLOBLO_USE_LOCALSTACK").as_deref() == Some("true");

        let presign_expiration = var("BLOBLO_PRESIGN_EXPIRATION_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PRESIGN_EXPIRATION);

        let blob_marker =
            var("BLOBLO_BLOB_MARKER").unwrap_or_else(|| DEFAULT_BLOB_MARKER.to_string());

        Ok(Self {
            listen_addr,
            bucket,
            upstream_url,
            preserve_host,
            use_localstack,
            presign_expiration,
            blob_marker,
        })
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            use_local_endpoint: self.use_localstack,
            ..S3Settings::new(self.bucket.clone())
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: normalize_listen_addr(DEFAULT_LISTEN_ADDR),
            bucket: DEFAULT_BUCKET.to_string(),
            upstream_url: Url::parse(DEFAULT_UPSTREAM_URL).expect("default upstream URL is valid"),
            preserve_host: false,
            use_localstack: false,
            presign_expiration: DEFAULT_PRESIGN_EXPIRATION,
            blob_marker: DEFAULT_BLOB_MARKER.to_string(),
        }
    }
}

/// `:7777` binds every interface
fn normalize_listen_addr(raw: &str) -> String {
    if raw.starts_with(':') {
        format!("0.0.0.0{}", raw)
    } else {
        raw.to_string()
    }
}

fn parse_upstream_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ProxyError::Config(format!("Can't parse the upstream url {}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ProxyError::Config(format!(
            "Upstream url must be an http(s) URL with a host: {}",
            raw
        )));
    }

    Ok(url)
}
