//! Requests cloned from the inbound request and sent to the upstream

use crate::error::{ProxyError, Result};
use crate::headers::end_to_end;
use axum::http::request::Parts;
use axum::http::{header, Method, StatusCode, Uri};
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Client for the authorization probe and the miss-path fetch.
///
/// Redirects are followed; reqwest drops credentials when a redirect leaves
/// the upstream host. No default User-Agent is sent.
pub struct Upstream {
    base: Url,
    client: Client,
}

impl Upstream {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            client: Client::new(),
        }
    }

    /// Upstream scheme and authority with the inbound path and query
    pub fn url_for(&self, uri: &Uri) -> Url {
        upstream_url(&self.base, uri)
    }

    /// Clone the inbound request for the upstream.
    ///
    /// Every end-to-end header is carried over, credentials included. The
    /// inbound Host is dropped so the upstream host is used, and no body is
    /// sent.
    pub fn clone_request(&self, method: Method, parts: &Parts) -> reqwest::RequestBuilder {
        let mut headers = end_to_end(&parts.headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        self.client
            .request(method, self.url_for(&parts.uri))
            .headers(headers)
    }

    /// Metadata-only request confirming the client may read the blob
    pub async fn probe(&self, parts: &Parts) -> Result<StatusCode> {
        let response = self
            .clone_request(Method::HEAD, parts)
            .send()
            .await
            .map_err(ProxyError::from)?;

        debug!(uri = %parts.uri, status = %response.status(), "Upstream probe");
        Ok(response.status())
    }

    /// Full GET of the blob; the body is left unread for streaming
    pub async fn fetch(&self, parts: &Parts) -> Result<reqwest::Response> {
        self.clone_request(Method::GET, parts)
            .send()
            .await
            .map_err(ProxyError::from)
    }
}

/// `base` with its path replaced by the path and query of `uri`
pub(crate) fn upstream_url(base: &Url, uri: &Uri) -> Url {
    let mut url = base.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url
}
