//! Glues the embedded engine, the configured repositories, the Ingestion
//! Pipeline and the Query Router together behind one handle, the way a
//! composition root (the CLI in `src/bin/ach-sql.rs`, or an embedder's own
//! binary) constructs and holds them for the life of the process.

use crate::ach::ValidateOpts;
use crate::config::Config;
use crate::ingest::{self, IngestOutcome};
use crate::mask::MaskingOptions;
use crate::metrics::IngestMetrics;
use crate::query::{self, QueryError, SearchParams};
use crate::results::Results;
use crate::schema::{self, EnginePool, SchemaError};
use crate::storage::{FilterParams, MultiRepository, Repository, StorageError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Ingest(#[from] ingest::IngestError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl crate::ErrorClassification for ServiceError {
    fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Configuration(_) => false,
            ServiceError::Schema(_) => false,
            ServiceError::Ingest(e) => e.is_retryable(),
            ServiceError::Query(e) => e.is_retryable(),
        }
    }
}

/// The long-lived handle a composition root holds: an open engine pool, a
/// repository fanned out across every configured storage backend, and the
/// masking/validation options ingestion runs with.
pub struct Service {
    pool: EnginePool,
    repository: Arc<dyn Repository>,
    masking: MaskingOptions,
    validate_opts: ValidateOpts,
    metrics: Arc<IngestMetrics>,
}

impl Service {
    /// Opens the embedded engine at the configured location, migrates it,
    /// and builds a repository over every configured storage backend.
    pub fn from_config(config: &Config, runtime_handle: &tokio::runtime::Handle) -> Result<Self, ServiceError> {
        let path = config
            .engine
            .resolved_path()
            .map_err(ServiceError::Configuration)?;
        let pool = schema::open(
            &path,
            config.engine.busy_timeout_ms,
            config.engine.max_open_conns,
        )?;

        let repository: Arc<dyn Repository> = Arc::new(MultiRepository::from_config(
            &config.storage,
            runtime_handle,
        ));

        let metrics = Arc::new(
            IngestMetrics::new().map_err(|e| ServiceError::Configuration(e.to_string()))?,
        );

        Ok(Service {
            pool,
            repository,
            masking: config.ach_masking,
            validate_opts: config.ach_validate_opts.clone(),
            metrics,
        })
    }

    /// Lists every configured source, ingesting whatever matches `params`.
    pub async fn ingest(&self, params: FilterParams) -> Result<Vec<IngestOutcome>, ServiceError> {
        Ok(ingest::ingest_ach_files(
            self.repository.clone(),
            self.pool.clone(),
            params,
            self.masking,
            self.validate_opts.clone(),
            self.metrics.clone(),
        )
        .await?)
    }

    /// Runs `query_text` against the embedded engine.
    pub fn query(&self, query_text: &str, params: &SearchParams) -> Result<Results, ServiceError> {
        Ok(query::search(&self.pool, query_text, params)?)
    }

    /// Renders the current metric values in Prometheus text exposition
    /// format. Binding this to an HTTP listener is the composition root's
    /// job, not this crate's.
    pub fn metrics_snapshot(&self) -> anyhow::Result<Vec<u8>> {
        self.metrics.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            engine: EngineConfig {
                directory: Some(dir.to_path_buf()),
                ..Default::default()
            },
            storage: vec![crate::config::StorageBackendConfig::Filesystem {
                directories: vec![dir.to_path_buf()],
            }],
            ach_validate_opts: ValidateOpts {
                allow_zero_batches: true,
                bypass_origin_validation: true,
                bypass_destination_validation: true,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ingests_and_queries_a_configured_directory() {
        let tempdir = tempfile::TempDir::new().unwrap();
        let header = crate::ach::FileHeader {
            immediate_origin: "123456789".into(),
            ..Default::default()
        };
        let control = crate::ach::FileControl::default();
        std::fs::write(
            tempdir.path().join("sample.ach"),
            format!("{}\n{}", header.to_nacha_line(), control.to_nacha_line()),
        )
        .unwrap();

        let service = Service::from_config(&test_config(tempdir.path()), &tokio::runtime::Handle::current())
            .unwrap();

        let outcomes = service.ingest(FilterParams::default()).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_ok());

        let results = service
            .query("SELECT COUNT(*) AS n FROM ach_files", &SearchParams::default())
            .unwrap();
        assert_eq!(results.headers, vec!["n"]);
    }

    #[tokio::test]
    async fn rejects_a_config_with_no_engine_location() {
        let config = Config::default();
        let err = Service::from_config(&config, &tokio::runtime::Handle::current()).unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }
}
