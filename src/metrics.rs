use prometheus::{IntCounterVec, Opts, Registry};

/// A group of collectors tracking the Ingestion Pipeline's work. Exposing
/// these over an HTTP `/metrics` endpoint is left to the composition root
/// that embeds this crate (out of scope here, as is all HTTP server boot),
/// but the collectors themselves -- and the counting discipline around them
/// -- live here because they're meaningless without knowing exactly which
/// pipeline events to attribute them to.
///
/// Each instance owns a private `Registry` rather than registering into
/// `prometheus::default_registry()`, so constructing more than one
/// `IngestMetrics` (as tests and multi-instance embedders both do) never
/// collides on metric names.
#[derive(Debug, Clone)]
pub struct IngestMetrics {
    registry: Registry,
    pub files_listed: IntCounterVec,
    pub files_ingested: IntCounterVec,
    pub rows_inserted: IntCounterVec,
}

impl IngestMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let files_listed = IntCounterVec::new(
            Opts::new(
                "ach_sql_files_listed_total",
                "Number of files returned by a listing call, by source_id",
            ),
            &["source_id"],
        )?;
        let files_ingested = IntCounterVec::new(
            Opts::new(
                "ach_sql_files_ingested_total",
                "Number of files that completed ingest_ach_file, by outcome",
            ),
            &["outcome"],
        )?;
        let rows_inserted = IntCounterVec::new(
            Opts::new(
                "ach_sql_rows_inserted_total",
                "Number of rows inserted, by table",
            ),
            &["table"],
        )?;

        registry.register(Box::new(files_listed.clone()))?;
        registry.register(Box::new(files_ingested.clone()))?;
        registry.register(Box::new(rows_inserted.clone()))?;

        Ok(IngestMetrics {
            registry,
            files_listed,
            files_ingested,
            rows_inserted,
        })
    }

    pub fn record_listed(&self, source_id: &str, count: usize) {
        self.files_listed
            .with_label_values(&[source_id])
            .inc_by(count as u64);
    }

    pub fn record_ingested(&self, outcome: &str) {
        self.files_ingested.with_label_values(&[outcome]).inc();
    }

    pub fn record_rows(&self, table: &str, count: usize) {
        self.rows_inserted
            .with_label_values(&[table])
            .inc_by(count as u64);
    }

    /// Renders this instance's registry in the Prometheus text exposition
    /// format. A composition root that does own an HTTP server can hand this
    /// straight back as a response body for `GET /metrics`.
    pub fn render(&self) -> anyhow::Result<Vec<u8>> {
        use prometheus::{Encoder, TextEncoder};
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| anyhow::anyhow!("failed to encode metrics: {}", e))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_increment_expected_labels() {
        let metrics = IngestMetrics::new().unwrap();
        metrics.record_listed("filesystem", 3);
        metrics.record_ingested("success");
        metrics.record_ingested("success");
        metrics.record_ingested("failure");
        metrics.record_rows("ach_entries", 10);

        assert_eq!(metrics.files_listed.with_label_values(&["filesystem"]).get(), 3);
        assert_eq!(metrics.files_ingested.with_label_values(&["success"]).get(), 2);
        assert_eq!(metrics.files_ingested.with_label_values(&["failure"]).get(), 1);
        assert_eq!(metrics.rows_inserted.with_label_values(&["ach_entries"]).get(), 10);
    }
}
