//! HTTP server for the proxy
//!
//! No routes of its own: every method and path is handed to the proxy.

use crate::proxy::BlobloProxy;
use axum::{body::Body, extract::State, http::Request, response::Response, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub type SharedState = Arc<BlobloProxy>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .fallback(proxy_request)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server, returning once a shutdown signal has drained it
pub async fn start_server(state: SharedState, addr: &str) -> std::io::Result<()> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn proxy_request(State(state): State<SharedState>, req: Request<Body>) -> Response {
    state.handle(req).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackProxy;
    use crate::upstream::Upstream;
    use axum::http::{header, Method, StatusCode};
    use object_blob_cache::MemoryBlobCache;
    use tower::ServiceExt;
    use url::Url;
    use wiremock::matchers::{any, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_state(server: &MockServer, cache: Arc<MemoryBlobCache>) -> SharedState {
        let base = Url::parse(&server.uri()).unwrap();
        Arc::new(BlobloProxy::new(
            Upstream::new(base.clone()),
            cache,
            FallbackProxy::new(base, false),
        ))
    }

    #[tokio::test]
    async fn test_blob_download_then_redirect() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("test response"))
            .mount(&server)
            .await;
        let cache = Arc::new(MemoryBlobCache::new("http://cache.example/bucket"));
        let state = create_test_state(&server, cache.clone());

        let response = create_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/v2/repo/blobs/sha256:891b05d87f5e")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"test response");

        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/v2/repo/blobs/sha256:891b05d87f5e")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "http://cache.example/bucket/sha256:891b05d87f5e"
        );
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_any_method_and_path_is_proxied() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
        let cache = Arc::new(MemoryBlobCache::new("http://cache.example"));
        let router = create_router(create_test_state(&server, cache.clone()));

        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/v2/repo/manifests/sha256:abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_start_server_rejects_bad_address() {
        let server = MockServer::start().await;
        let cache = Arc::new(MemoryBlobCache::new("http://cache.example"));
        let state = create_test_state(&server, cache);

        let result = start_server(state, "not an address").await;
        assert!(result.is_err());
    }
}
