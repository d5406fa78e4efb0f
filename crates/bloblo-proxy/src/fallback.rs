//! Transparent reverse proxy to the upstream for everything not intercepted

use crate::headers::end_to_end;
use crate::upstream::upstream_url;
use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::error;
use url::Url;

type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Forwards requests unchanged apart from the target and Host header.
///
/// Built on a bare hyper client, which adds no headers of its own: no
/// User-Agent, no Accept. Redirects from the upstream are relayed, not
/// followed.
pub struct FallbackProxy {
    base: Url,
    client: UpstreamClient,
    preserve_host: bool,
}

impl FallbackProxy {
    pub fn new(base: Url, preserve_host: bool) -> Self {
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            base,
            client,
            preserve_host,
        }
    }

    pub async fn forward(&self, req: Request<Body>) -> Response {
        let (mut parts, body) = req.into_parts();
        let target = upstream_url(&self.base, &parts.uri);
        let uri: Uri = match target.as_str().parse() {
            Ok(uri) => uri,
            Err(e) => {
                error!(url = %target, error = %e, "Upstream url is not a valid request target");
                return StatusCode::BAD_GATEWAY.into_response();
            }
        };

        let mut headers = end_to_end(&parts.headers);
        if self.preserve_host {
            // HTTP/2 clients send the authority instead of a Host header
            if !headers.contains_key(header::HOST) {
                if let Some(value) = parts
                    .uri
                    .authority()
                    .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
                {
                    headers.insert(header::HOST, value);
                }
            }
        } else {
            // hyper fills in the upstream authority
            headers.remove(header::HOST);
        }

        parts.uri = uri;
        parts.headers = headers;

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(upstream) => {
                let (parts, body) = upstream.into_parts();
                let mut response = Response::new(Body::new(body));
                *response.status_mut() = parts.status;
                *response.headers_mut() = end_to_end(&parts.headers);
                response
            }
            Err(e) => {
                error!(error = %e, "Fallback proxy failed to reach the upstream");
                StatusCode::BAD_GATEWAY.into_response()
            }
        }
    }
}
