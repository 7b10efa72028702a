#![allow(clippy::too_many_arguments)]

use ids::StampError;
use ingest::IngestError;
use query::QueryError;
use ring::digest;
use schema::SchemaError;
use std::io::Write;
use storage::StorageError;

pub mod ach;
pub mod addenda;
pub mod config;
pub mod ids;
pub mod ingest;
pub mod logging;
pub mod mask;
pub mod metrics;
pub mod query;
mod retries;
pub mod results;
pub mod schema;
pub mod service;
pub mod storage;
pub mod transport;

/// Layout string used when a storage backend derives a listing path from a
/// time window.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// The crate-wide error type. Every fallible operation in this crate bottoms
/// out here so callers have one type to match on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Stamp(#[from] StampError),
}

/// This trait captures whether a given error is due to corruption in
/// caller-provided data, in which case it is unnecessary to retry its
/// processing, or due to I/O errors or storage/engine hiccups, in which case
/// processing should be retried later.
pub trait ErrorClassification {
    fn is_retryable(&self) -> bool;
}

impl ErrorClassification for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Catch-all error type -- retries OK.
            Error::AnyhowError(_) => true,
            // A bad config value will be just as bad on retry.
            Error::Configuration(_) => false,
            // Dispatch to the wrapped error type.
            Error::Storage(e) => e.is_retryable(),
            // DDL failures at boot are not transient.
            Error::Schema(_) => false,
            Error::Ingest(e) => e.is_retryable(),
            // Query errors are reports about the caller's SQL text.
            Error::Query(_) => false,
            Error::Stamp(_) => false,
        }
    }
}

/// A wrapper-writer that computes a SHA-256 digest over the content it is
/// provided. Used by the Identity Stamper to hash canonical record
/// serializations without buffering the whole record in memory twice.
pub struct DigestWriter<W: Write> {
    writer: W,
    context: digest::Context,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(writer: W) -> DigestWriter<W> {
        DigestWriter {
            writer,
            context: digest::Context::new(&digest::SHA256),
        }
    }

    /// Consumes the DigestWriter and returns the computed SHA-256 hash.
    pub fn finish(self) -> digest::Digest {
        self.context.finish()
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, std::io::Error> {
        let result = self.writer.write(buf);
        if let Ok(n) = result {
            self.context.update(&buf[..n]);
        }
        result
    }

    fn flush(&mut self) -> Result<(), std::io::Error> {
        self.writer.flush()
    }
}

/// Hex-encoded SHA-256 of `data`, the building block of every content-addressed
/// identifier in this crate.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut writer = DigestWriter::new(Vec::new());
    writer.write_all(data).expect("writing to a Vec cannot fail");
    hex::encode(writer.finish().as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn digest_writer_test() {
        const TEST_STR: &[u8] = b"I expect to be written into sha256";
        const TEST_STR_DIGEST: &str =
            "b1b64ca32c118bfd5d1f40fdb25314468f82c0e9427f4f107ddfa89ce357a3ec"; // verified via sha256sum

        let mut written: Vec<u8> = Vec::new();
        let mut writer = DigestWriter::new(&mut written);
        let written_cnt = writer.write(TEST_STR).unwrap();
        let digest = hex::encode(writer.finish().as_ref());

        assert_eq!(written_cnt, TEST_STR.len());
        assert_eq!(&written[..], TEST_STR);
        assert_eq!(&digest, TEST_STR_DIGEST);
    }

    #[test]
    fn sha256_hex_matches_digest_writer() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn configuration_errors_are_not_retryable() {
        let err = Error::Configuration("bad path".into());
        assert!(!err.is_retryable());
    }
}
