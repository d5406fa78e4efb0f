//! Error types for the blob cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    Storage(Box<object_store::Error>),
    Stream(Box<std::io::Error>),
    Presign(String),
    Config(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Storage(err) => write!(f, "Storage error: {}", err),
            CacheError::Stream(err) => write!(f, "Blob stream error: {}", err),
            CacheError::Presign(msg) => write!(f, "Presign error: {}", msg),
            CacheError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Storage(err) => Some(err.as_ref()),
            CacheError::Stream(err) => Some(err.as_ref()),
            CacheError::Presign(_) | CacheError::Config(_) => None,
        }
    }
}

impl From<object_store::Error> for CacheError {
    fn from(err: object_store::Error) -> Self {
        CacheError::Storage(Box::new(err))
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Stream(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
