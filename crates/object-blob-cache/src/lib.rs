//! Content-addressed blob cache
//!
//! Stores blobs under their digest in an object store and hands out
//! time-limited links so clients can fetch them directly. Backends are
//! interchangeable behind the [`BlobCache`] trait.

mod backend;
mod cache;
mod error;
mod memory;
mod types;

pub use backend::ObjectStoreCache;
pub use cache::BlobCache;
pub use error::{CacheError, Result};
pub use memory::MemoryBlobCache;
pub use types::{ByteStream, S3Settings, DEFAULT_PRESIGN_EXPIRATION};
