use atty::Stream;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// `event` defines the structured field names this crate attaches to log
/// records, so a grep across the codebase finds every place a given piece of
/// context is logged.
pub mod event {
    pub const FILENAME: &str = "filename";
    pub const SOURCE_ID: &str = "source_id";
    pub const STORAGE_PATH: &str = "storage_path";
    pub const FILE_ID: &str = "file_id";
    pub const BATCH_ID: &str = "batch_id";
    pub const ENTRY_ID: &str = "entry_id";
    pub const TYPE_CODE: &str = "type_code";
    pub const ACTION: &str = "action";
}

/// Options for configuring logging in this application.
pub struct LoggingConfiguration<'a> {
    /// If true, logging output will be forced to JSON regardless of whether
    /// stderr is a tty. If false, format is chosen by detecting whether
    /// stderr is a tty: pretty output for a terminal, JSON otherwise (the
    /// assumption being that a non-tty stderr means we're running under a
    /// log collector).
    pub force_json_output: bool,
    /// Messages below this level will be discarded unless overridden by
    /// `RUST_LOG`.
    pub log_level: &'a str,
}

/// Initializes the global `tracing` subscriber. Must be called at most once,
/// as early as possible in `main`. Returns an error if `log_level` isn't a
/// valid `tracing` filter directive.
pub fn init(config: &LoggingConfiguration) -> anyhow::Result<()> {
    let json_output = atty::isnt(Stream::Stderr) || config.force_json_output;

    let filter = EnvFilter::try_new(config.log_level)
        .map_err(|e| anyhow::anyhow!("{} is not a valid log level: {}", config.log_level, e))?;
    // RUST_LOG, when set, always wins over the configured default level.
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        filter
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    if json_output {
        subscriber.json().try_init()
    } else {
        subscriber.pretty().try_init()
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}

/// Initializes logging for unit and integration tests. Safe to call more than
/// once; only the first call takes effect.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
