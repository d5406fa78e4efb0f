//! Bloblo Proxy - blob download offloading in front of an artifact server
//!
//! Repeat blob downloads are redirected to presigned object-store links;
//! first downloads are relayed from the upstream while being uploaded.

use bloblo_proxy::{
    start_server, BlobPathClassifier, BlobloProxy, FallbackProxy, ProxyConfig, Result,
    SharedState, Upstream,
};
use object_blob_cache::ObjectStoreCache;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("bloblo_proxy=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Bloblo Proxy...");

    let config = load_config()?;
    info!("Listen address: {}", config.listen_addr);
    info!("Upstream: {}", config.upstream_url);
    info!("Bucket: {}", config.bucket);
    info!("Preserve host: {}", config.preserve_host);
    info!("Local object store: {}", config.use_localstack);
    info!(
        "Presign expiration: {} seconds",
        config.presign_expiration.as_secs()
    );

    let cache = ObjectStoreCache::s3(&config.s3_settings(), config.presign_expiration)?;
    if let Err(e) = cache.verify().await {
        error!(bucket = %config.bucket, error = %e, "Object store is not usable");
        return Err(e.into());
    }

    let proxy = BlobloProxy::new(
        Upstream::new(config.upstream_url.clone()),
        Arc::new(cache),
        FallbackProxy::new(config.upstream_url.clone(), config.preserve_host),
    )
    .with_classifier(BlobPathClassifier::new(&config.blob_marker));

    let state: SharedState = Arc::new(proxy);

    // Start HTTP server (blocking)
    start_server(state, &config.listen_addr).await?;

    info!("Bloblo Proxy stopped");
    Ok(())
}

fn load_config() -> Result<ProxyConfig> {
    ProxyConfig::from_env()
}
