//! Blob Offloading Handler
//!
//! Every inbound request passes through [`BlobloProxy::handle`]:
//!
//! - anything other than a GET on a blob path goes to the fallback proxy
//! - the upstream is asked (HEAD, caller's credentials) whether the caller may
//!   read the blob; a refusal is handed to the fallback so the caller sees the
//!   upstream's own answer
//! - a cached blob is answered with a redirect to a presigned link
//! - an uncached blob is fetched once and streamed to the caller and the cache
//!   at the same time

use crate::classifier::{blob_digest, BlobPathClassifier, Classifier};
use crate::fallback::FallbackProxy;
use crate::headers::{basic_auth_user, end_to_end};
use crate::tee::{Tee, RELAY_CHANNEL_DEPTH};
use crate::upstream::Upstream;
use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use object_blob_cache::BlobCache;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

pub struct BlobloProxy {
    upstream: Upstream,
    cache: Arc<dyn BlobCache>,
    fallback: FallbackProxy,
    classifier: Arc<dyn Classifier>,
}

impl BlobloProxy {
    /// Proxy with the default `.../blobs/<digest>` classifier
    pub fn new(upstream: Upstream, cache: Arc<dyn BlobCache>, fallback: FallbackProxy) -> Self {
        Self {
            upstream,
            cache,
            fallback,
            classifier: Arc::new(BlobPathClassifier::default()),
        }
    }

    pub fn with_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub async fn handle(&self, req: Request<Body>) -> Response {
        info!(method = %req.method(), uri = %req.uri(), "Incoming request");

        if req.method() != Method::GET || !self.classifier.is_cacheable(req.uri().path()) {
            return self.fallback.forward(req).await;
        }

        let (parts, body) = req.into_parts();
        let digest = blob_digest(parts.uri.path()).to_string();

        let status = match self.upstream.probe(&parts).await {
            Ok(status) => status,
            Err(e) => {
                error!(digest = %digest, error = %e, "Failed to reach the upstream");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        if status != StatusCode::OK {
            debug!(digest = %digest, status = %status, "Upstream refused probe, falling back");
            return self.fallback.forward(Request::from_parts(parts, body)).await;
        }

        let cached = match self.cache.exists(&digest).await {
            Ok(cached) => cached,
            Err(e) => {
                error!(digest = %digest, error = %e, "Failed to check if blob is in cache");
                false
            }
        };

        if cached {
            let user = basic_auth_user(&parts.headers).unwrap_or_default();
            info!(
                digest = %digest,
                user = %user,
                action = "serve_blob",
                "Serving blob from cache"
            );

            match self.presigned_redirect(&digest).await {
                Some(response) => return response,
                None => return self.fallback.forward(Request::from_parts(parts, body)).await,
            }
        }

        self.relay_and_store(&parts, digest).await
    }

    async fn presigned_redirect(&self, digest: &str) -> Option<Response> {
        let url = match self.cache.presign(digest).await {
            Ok(url) => url,
            Err(e) => {
                error!(digest = %digest, error = %e, "Failed to get a presigned url");
                return None;
            }
        };

        match HeaderValue::from_str(&url) {
            Ok(location) => Some((StatusCode::FOUND, [(header::LOCATION, location)]).into_response()),
            Err(e) => {
                error!(digest = %digest, error = %e, "Presigned url is not a valid Location");
                None
            }
        }
    }

    /// Fetch the blob and tee it to the caller and the cache.
    ///
    /// The caller's body ends only after the store has returned, so a
    /// completed download means the upload attempt is over too.
    async fn relay_and_store(&self, parts: &Parts, digest: String) -> Response {
        let upstream = match self.upstream.fetch(parts).await {
            Ok(response) => response,
            Err(e) => {
                error!(digest = %digest, error = %e, "Failed to reach the upstream");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let status = upstream.status();
        let headers = end_to_end(upstream.headers());

        if status != StatusCode::OK {
            warn!(digest = %digest, status = %status, "Upstream fetch not OK, relaying without caching");
            return relay_response(status, headers, Body::from_stream(upstream.bytes_stream()));
        }

        info!(digest = %digest, action = "upload_blob", "Uploading blob to cache");

        let (client_tx, client_rx) = mpsc::channel(RELAY_CHANNEL_DEPTH);
        let (store_tx, store_rx) = mpsc::channel(RELAY_CHANNEL_DEPTH);
        let cache = Arc::clone(&self.cache);

        tokio::spawn(async move {
            let tee = Tee::new(upstream.bytes_stream(), client_tx.clone(), store_tx);
            let (report, stored) = tokio::join!(
                tee.run(),
                cache.store(&digest, ReceiverStream::new(store_rx).boxed())
            );

            if let Some(e) = &report.read_error {
                warn!(digest = %digest, error = %e, "Upstream body ended early");
            }
            if report.primary_closed {
                debug!(digest = %digest, bytes = report.bytes, "Client went away during relay");
            }
            match stored {
                Ok(()) => debug!(digest = %digest, bytes = report.bytes, "Blob stored"),
                Err(e) => error!(digest = %digest, error = %e, "Error uploading blob"),
            }

            drop(client_tx);
        });

        relay_response(
            status,
            headers,
            Body::from_stream(ReceiverStream::new(client_rx)),
        )
    }
}

fn relay_response(status: StatusCode, headers: axum::http::HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
