//! Decides which request paths are blob downloads worth intercepting

/// Cacheability predicate over the request path (query string excluded)
pub trait Classifier: Send + Sync {
    fn is_cacheable(&self, path: &str) -> bool;
}

impl<F> Classifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_cacheable(&self, path: &str) -> bool {
        self(path)
    }
}

/// Matches `.../<marker>/<digest>` with a non-empty digest, e.g.
/// `/v2/library/alpine/blobs/sha256:...`
#[derive(Debug, Clone)]
pub struct BlobPathClassifier {
    marker: String,
}

impl BlobPathClassifier {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for BlobPathClassifier {
    fn default() -> Self {
        Self::new("blobs")
    }
}

impl Classifier for BlobPathClassifier {
    fn is_cacheable(&self, path: &str) -> bool {
        let segments: Vec<&str> = path.split('/').collect();
        let n = segments.len();
        n > 2 && segments[n - 2] == self.marker && !segments[n - 1].is_empty()
    }
}

/// The final path segment, used verbatim as the cache key
pub fn blob_digest(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
