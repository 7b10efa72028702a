//! The File Source Aggregator: enumerates ACH files across configured
//! backends and fetches + parses them on demand. `Repository` is the seam;
//! `FilesystemRepository` and `S3Repository` are the two variants this
//! crate ships, and `MultiRepository` is the union that fans a listing call
//! out across every configured backend.

use crate::ach::{self, File as AchFile};
use crate::config::StorageBackendConfig;
use crate::transport::{LocalFileTransport, S3Transport, Transport, TransportError};
use chrono::{DateTime, Utc};

/// A time window plus an optional filename substring filter. Time filtering
/// is each backend's own responsibility (it interprets the filename or
/// path); pattern filtering is applied uniformly here.
#[derive(Clone, Debug, Default)]
pub struct FilterParams {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub pattern: String,
}

impl FilterParams {
    fn matches(&self, name: &str) -> bool {
        self.pattern.is_empty() || name.contains(&self.pattern)
    }
}

/// One file as seen by a listing call, before its contents are fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileListing {
    pub name: String,
    pub storage_path: String,
    pub source_id: String,
}

/// A file's raw name alongside its parsed record tree, as returned by
/// [`Repository::get`].
#[derive(Debug)]
pub struct File {
    pub filename: String,
    pub parsed_record_tree: AchFile,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Ach(#[from] ach::AchError),
    #[error("no configured source with id '{0}'")]
    UnknownSource(String),
}

impl crate::ErrorClassification for StorageError {
    fn is_retryable(&self) -> bool {
        match self {
            StorageError::Transport(e) => e.is_retryable(),
            StorageError::Ach(_) => false,
            StorageError::UnknownSource(_) => false,
        }
    }
}

/// A source of ACH files: list what's available, fetch and parse one.
pub trait Repository: Send + Sync {
    fn list(&self, params: &FilterParams) -> Result<Vec<FileListing>, StorageError>;
    fn get(&self, listing: &FileListing) -> Result<File, StorageError>;
}

/// A single filesystem directory, identified by `source_id` in its
/// listings.
pub struct FilesystemRepository {
    source_id: String,
    transport: LocalFileTransport,
}

impl FilesystemRepository {
    pub fn new(source_id: String, directory: std::path::PathBuf) -> Self {
        FilesystemRepository {
            source_id,
            transport: LocalFileTransport::new(directory),
        }
    }
}

impl Repository for FilesystemRepository {
    fn list(&self, params: &FilterParams) -> Result<Vec<FileListing>, StorageError> {
        let storage_path = self.transport.path();
        Ok(self
            .transport
            .list()?
            .into_iter()
            .filter(|name| params.matches(name))
            .map(|name| FileListing {
                storage_path: format!("{}/{}", storage_path, name),
                name,
                source_id: self.source_id.clone(),
            })
            .collect())
    }

    fn get(&self, listing: &FileListing) -> Result<File, StorageError> {
        let mut reader = self.transport.get(&listing.name)?;
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut reader, &mut bytes)
            .map_err(|e| StorageError::Transport(TransportError::Local(e, listing.name.clone())))?;
        let parsed_record_tree = ach::parse(&bytes)?;
        Ok(File {
            filename: listing.name.clone(),
            parsed_record_tree,
        })
    }
}

/// A single S3-compatible bucket/prefix, identified by `source_id`.
pub struct S3Repository {
    source_id: String,
    transport: S3Transport,
}

impl S3Repository {
    pub fn new(source_id: String, path: crate::config::S3Path, runtime_handle: &tokio::runtime::Handle) -> Self {
        S3Repository {
            source_id,
            transport: S3Transport::new(path, runtime_handle),
        }
    }
}

impl Repository for S3Repository {
    fn list(&self, params: &FilterParams) -> Result<Vec<FileListing>, StorageError> {
        let storage_path = self.transport.path();
        Ok(self
            .transport
            .list()?
            .into_iter()
            .filter(|name| params.matches(name))
            .map(|name| FileListing {
                storage_path: format!("{}{}", storage_path, name),
                name,
                source_id: self.source_id.clone(),
            })
            .collect())
    }

    fn get(&self, listing: &FileListing) -> Result<File, StorageError> {
        let mut reader = self.transport.get(&listing.name)?;
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut reader, &mut bytes).map_err(|e| {
            StorageError::Transport(TransportError::Local(e, listing.name.clone()))
        })?;
        let parsed_record_tree = ach::parse(&bytes)?;
        Ok(File {
            filename: listing.name.clone(),
            parsed_record_tree,
        })
    }
}

/// The union of every configured backend. `list` concatenates across all
/// sub-repositories; any sub-failure propagates, aborting the whole
/// listing. `get` routes to the sub-repository whose `source_id` matches
/// the listing in hand.
pub struct MultiRepository {
    repositories: Vec<(String, Box<dyn Repository>)>,
}

impl MultiRepository {
    pub fn new() -> Self {
        MultiRepository {
            repositories: Vec::new(),
        }
    }

    pub fn add(&mut self, source_id: String, repository: Box<dyn Repository>) {
        self.repositories.push((source_id, repository));
    }

    /// Builds a `MultiRepository` from a deployment's configured backend
    /// list, naming filesystem sources `filesystem-{n}` since they carry no
    /// explicit `source_id` in configuration (unlike S3 backends, which do).
    pub fn from_config(
        backends: &[StorageBackendConfig],
        runtime_handle: &tokio::runtime::Handle,
    ) -> Self {
        let mut multi = MultiRepository::new();
        for (i, backend) in backends.iter().enumerate() {
            match backend {
                StorageBackendConfig::Filesystem { directories } => {
                    for dir in directories {
                        let source_id = format!("filesystem-{}", i);
                        multi.add(
                            source_id.clone(),
                            Box::new(FilesystemRepository::new(source_id, dir.clone())),
                        );
                    }
                }
                StorageBackendConfig::S3 { path, source_id } => {
                    multi.add(
                        source_id.clone(),
                        Box::new(S3Repository::new(source_id.clone(), path.clone(), runtime_handle)),
                    );
                }
            }
        }
        multi
    }
}

impl Default for MultiRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MultiRepository {
    fn list(&self, params: &FilterParams) -> Result<Vec<FileListing>, StorageError> {
        let mut all = Vec::new();
        for (_, repository) in &self.repositories {
            all.extend(repository.list(params)?);
        }
        Ok(all)
    }

    fn get(&self, listing: &FileListing) -> Result<File, StorageError> {
        let (_, repository) = self
            .repositories
            .iter()
            .find(|(source_id, _)| source_id == &listing.source_id)
            .ok_or_else(|| StorageError::UnknownSource(listing.source_id.clone()))?;
        repository.get(listing)
    }
}
