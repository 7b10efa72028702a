//! The bottom layer of the File Source Aggregator: a `Transport` trait
//! abstracting "somewhere ACH files live" over the local filesystem and
//! S3-compatible object storage, the way the teacher's `transport.rs`
//! abstracted cloud batch storage. This crate's domain is read-only, so
//! unlike the teacher's transport the trait here never writes -- `get` and
//! `list` are its whole surface.

mod local;
mod s3;

use std::{fmt::Debug, io::Read};

pub use local::LocalFileTransport;
pub use s3::S3Transport;

/// A transport moves bytes out of some read-only data store -- local files
/// or a cloud object store. `list` and `get` both take the connection they
/// need to reach that store; a `Transport` is typically constructed once
/// per configured backend and reused across every listing and fetch.
pub trait Transport: Debug + Send + Sync {
    /// Returns the keys of every object this transport can see. Backends
    /// that support server-side filtering may use it; the File Source
    /// Aggregator applies pattern filtering again itself so this is
    /// strictly an optimization, never a correctness requirement.
    fn list(&self) -> Result<Vec<String>, TransportError>;

    /// Returns a reader over the bytes stored at `key`.
    fn get(&self, key: &str) -> Result<Box<dyn Read>, TransportError>;

    /// A human-readable identifier for this transport's location, used in
    /// logging and in `FileListing::storage_path`.
    fn path(&self) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("object not found: {0}")]
    ObjectNotFound(String),
    #[error("local filesystem I/O on {1}: {0}")]
    Local(std::io::Error, String),
    #[error("S3 operation failed: {0}")]
    S3(String),
}

impl crate::ErrorClassification for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            TransportError::ObjectNotFound(_) => false,
            TransportError::Local(_, _) => true,
            TransportError::S3(_) => true,
        }
    }
}
