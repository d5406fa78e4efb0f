//! Bloblo Proxy Library
//!
//! Sits in front of an artifact server, sends repeat blob downloads straight
//! to an object store via presigned links, and fills the store on first
//! download while relaying the bytes to the client.

pub mod classifier;
pub mod config;
pub mod error;
pub mod fallback;
pub mod headers;
pub mod proxy;
pub mod server;
pub mod tee;
pub mod upstream;

pub use classifier::{blob_digest, BlobPathClassifier, Classifier};
pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use fallback::FallbackProxy;
pub use proxy::BlobloProxy;
pub use server::{create_router, start_server, SharedState};
pub use upstream::Upstream;
