//! The Relational Schema: DDL for the four tables the Ingestion Pipeline
//! writes into, and the pooled engine handle every other module reaches a
//! connection through.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

pub type EnginePool = Pool<SqliteConnectionManager>;
pub type PooledEngine = PooledConnection<SqliteConnectionManager>;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS ach_files (
        file_id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        immediate_destination TEXT,
        immediate_origin TEXT,
        file_creation_date TEXT,
        file_creation_time TEXT,
        file_id_modifier TEXT,
        immediate_destination_name TEXT,
        immediate_origin_name TEXT,
        reference_code TEXT,
        batch_count INTEGER,
        block_count INTEGER,
        entry_addenda_count INTEGER,
        entry_hash TEXT,
        total_debit_entry_dollar_amount INTEGER,
        total_credit_entry_dollar_amount INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ach_batches (
        batch_id TEXT PRIMARY KEY,
        file_id TEXT NOT NULL REFERENCES ach_files(file_id),
        service_class_code TEXT,
        company_name TEXT,
        company_identification TEXT,
        standard_entry_class_code TEXT,
        company_entry_description TEXT,
        company_descriptive_date TEXT,
        effective_entry_date TEXT,
        settlement_date TEXT,
        originator_status_code TEXT,
        odfi_identification TEXT,
        batch_number INTEGER,
        service_class_code_control TEXT,
        entry_addenda_count_control INTEGER,
        entry_hash_control TEXT,
        total_debit_entry_dollar_amount_control INTEGER,
        total_credit_entry_dollar_amount_control INTEGER,
        company_identification_control TEXT,
        odfi_identification_control TEXT,
        batch_number_control INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ach_entries (
        entry_id TEXT PRIMARY KEY,
        batch_id TEXT NOT NULL REFERENCES ach_batches(batch_id),
        file_id TEXT NOT NULL REFERENCES ach_files(file_id),
        transaction_code TEXT,
        rdfi_identification TEXT,
        check_digit TEXT,
        dfi_account_number TEXT,
        amount INTEGER,
        individual_identification_number TEXT,
        individual_name TEXT,
        discretionary_data TEXT,
        addenda_record_indicator TEXT,
        trace_number TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ach_addendas (
        entry_id TEXT NOT NULL REFERENCES ach_entries(entry_id),
        batch_id TEXT NOT NULL REFERENCES ach_batches(batch_id),
        file_id TEXT NOT NULL REFERENCES ach_files(file_id),
        type_code TEXT NOT NULL,

        terminal_identification_code TEXT,
        terminal_location TEXT,
        terminal_city TEXT,
        terminal_state TEXT,

        payment_related_information TEXT,

        change_code TEXT,
        original_entry_trace_number TEXT,
        original_rdfi_identification TEXT,
        corrected_data TEXT,

        refused_change_code TEXT,
        refused_original_entry_trace_number TEXT,
        refused_original_rdfi_identification TEXT,
        refused_corrected_data TEXT,

        return_code TEXT,
        original_trace_number TEXT,
        date_of_death TEXT,
        original_receiving_dfi_identification TEXT,

        contested_return_code TEXT,
        original_entry_trace_number_contested TEXT,
        date_original_entry_returned TEXT,
        original_receiving_dfi_identification_contested TEXT,
        original_settlement_date TEXT,
        return_trace_number TEXT,
        return_settlement_date TEXT,
        return_reason_code TEXT,
        dishonored_return_trace_number TEXT,
        dishonored_return_settlement_date TEXT,
        dishonored_return_reason_code TEXT,
        trace_number TEXT,

        dishonored_return_code TEXT,
        original_entry_trace_number_dishonored TEXT,
        return_settlement_date_dishonored TEXT,
        original_receiving_dfi_identification_dishonored TEXT,
        addenda_information TEXT,
        line_number INTEGER
    )
    "#,
];

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to open embedded engine: {0}")]
    Open(#[from] r2d2::Error),
    #[error("migration failed: {0}")]
    Migration(rusqlite::Error),
}

/// Opens (creating if absent) the embedded SQLite database at `path` and
/// runs every migration, returning a connection pool ready for concurrent
/// checkout by the Ingestion Pipeline and Query Router.
pub fn open(path: &Path, busy_timeout_ms: u32, max_open_conns: u32) -> Result<EnginePool, SchemaError> {
    let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
        conn.busy_timeout(std::time::Duration::from_millis(busy_timeout_ms as u64))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(())
    });
    let pool = Pool::builder()
        .max_size(max_open_conns)
        .build(manager)?;

    let conn = pool.get()?;
    migrate(&conn)?;

    Ok(pool)
}

/// Opens an in-memory database, used by unit and integration tests that
/// don't need a file on disk.
pub fn open_in_memory() -> Result<EnginePool, SchemaError> {
    let manager = SqliteConnectionManager::memory().with_init(|conn| {
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(())
    });
    let pool = Pool::builder().max_size(1).build(manager)?;
    let conn = pool.get()?;
    migrate(&conn)?;
    Ok(pool)
}

fn migrate(conn: &Connection) -> Result<(), SchemaError> {
    for statement in MIGRATIONS {
        conn.execute_batch(statement).map_err(SchemaError::Migration)?;
    }
    Ok(())
}

/// Whether a `rusqlite::Error` is worth retrying: a busy/locked database is
/// transient, everything else (constraint violations, malformed SQL, type
/// mismatches) is a property of the statement and retrying changes nothing.
pub fn is_retryable_sqlite_error(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked,
                ..
            },
            _
        )
    )
}
