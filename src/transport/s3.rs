use super::TransportError;
use crate::{config::S3Path, retries::retry_request};
use rusoto_core::{credential::DefaultCredentialsProvider, RusotoError};
use rusoto_s3::{GetObjectError, GetObjectRequest, ListObjectsV2Request, S3Client, S3};
use std::io::{Cursor, Read};
use tokio::{io::AsyncReadExt, runtime::Handle};

/// Implementation of `Transport` backed by an S3-compatible object store.
/// Every call blocks the calling thread on the async rusoto client via the
/// supplied runtime handle, the same pattern the teacher's own
/// `S3Transport` uses to expose a synchronous `Transport` over an
/// inherently async SDK.
#[derive(Clone, Debug)]
pub struct S3Transport {
    path: S3Path,
    runtime_handle: Handle,
}

impl S3Transport {
    pub fn new(path: S3Path, runtime_handle: &Handle) -> Self {
        Self {
            path: path.ensure_directory_prefix(),
            runtime_handle: runtime_handle.clone(),
        }
    }

    fn client(&self) -> Result<S3Client, TransportError> {
        let provider = DefaultCredentialsProvider::new()
            .map_err(|e| TransportError::S3(format!("credentials: {}", e)))?;
        Ok(S3Client::new_with(
            rusoto_core::HttpClient::new().map_err(|e| TransportError::S3(e.to_string()))?,
            provider,
            self.path.region.clone(),
        ))
    }

    fn is_transient<E: std::fmt::Debug>(err: &RusotoError<E>) -> bool {
        matches!(
            err,
            RusotoError::HttpDispatch(_) | RusotoError::Unknown(_)
        )
    }
}

impl super::Transport for S3Transport {
    fn path(&self) -> String {
        self.path.to_string()
    }

    fn list(&self) -> Result<Vec<String>, TransportError> {
        let client = self.client()?;
        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let bucket = self.path.bucket.clone();
            let prefix = self.path.key.clone();
            let token = continuation_token.clone();
            let request = ListObjectsV2Request {
                bucket,
                prefix: Some(prefix),
                continuation_token: token,
                ..Default::default()
            };

            let output = retry_request(
                || {
                    self.runtime_handle
                        .block_on(client.list_objects_v2(request.clone()))
                },
                Self::is_transient,
            )
            .map_err(|e| TransportError::S3(e.to_string()))?;

            for object in output.contents.unwrap_or_default() {
                if let Some(key) = object.key {
                    keys.push(key);
                }
            }

            match output.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(keys)
    }

    fn get(&self, key: &str) -> Result<Box<dyn Read>, TransportError> {
        let client = self.client()?;
        let full_key = key.to_owned();

        let output = retry_request(
            || {
                self.runtime_handle.block_on(client.get_object(GetObjectRequest {
                    bucket: self.path.bucket.clone(),
                    key: full_key.clone(),
                    ..Default::default()
                }))
            },
            |e: &RusotoError<GetObjectError>| match e {
                RusotoError::Service(GetObjectError::NoSuchKey(_)) => false,
                other => Self::is_transient(other),
            },
        )
        .map_err(|e| match e {
            RusotoError::Service(GetObjectError::NoSuchKey(_)) => {
                TransportError::ObjectNotFound(key.to_owned())
            }
            other => TransportError::S3(other.to_string()),
        })?;

        let body = output
            .body
            .ok_or_else(|| TransportError::S3("GetObject response had no body".into()))?;

        let mut buf = Vec::new();
        self.runtime_handle
            .block_on(body.into_async_read().read_to_end(&mut buf))
            .map_err(|e| TransportError::S3(e.to_string()))?;

        Ok(Box::new(Cursor::new(buf)))
    }
}
