//! The Query Router: submits operator SQL to the embedded engine, injecting
//! a filename filter when a pattern is configured. The injection is
//! deliberately textual rather than parsed -- see the hazard note on
//! [`inject_pattern`] -- kept because the distilled behavior this crate
//! re-implements is itself textual (a `strings.ReplaceAll` over the raw
//! query), not because it's the safer choice.

use crate::results::Results;
use crate::schema::EnginePool;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("query text must not be empty")]
    EmptyQuery,
    #[error(transparent)]
    Pool(#[from] r2d2::Error),
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

impl crate::ErrorClassification for QueryError {
    fn is_retryable(&self) -> bool {
        // Every query error is a report about the caller's SQL text.
        false
    }
}

/// Time range and filename pattern accompanying a query. Unlike
/// `storage::FilterParams`, only `pattern` is consulted here -- time
/// filtering against `ach_files`/`ach_batches` columns is the caller's own
/// WHERE clause.
#[derive(Clone, Debug, Default)]
pub struct SearchParams {
    pub pattern: String,
}

fn where_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bwhere\b").unwrap())
}

/// Textually rewrites every `WHERE` token in `query` to inject a filename
/// filter immediately after it. Coarse by design: it doesn't parse the SQL,
/// so it can't tell a real `WHERE` keyword from one embedded in a string
/// literal or identifier, and it does nothing for a query with no `WHERE`
/// at all (such a query is never filtered, even if a pattern is set).
pub fn inject_pattern(query: &str, pattern: &str) -> String {
    if pattern.is_empty() {
        return query.to_string();
    }
    let escaped = pattern.replace('\'', "''");
    let injected = format!("filename LIKE '%{}%' AND ", escaped);
    where_token_pattern()
        .replace_all(query, |caps: &regex::Captures| format!("{}{}", &caps[0], injected))
        .into_owned()
}

/// Runs `query_text` (after pattern injection) against the embedded engine
/// and returns its result set.
pub fn search(pool: &EnginePool, query_text: &str, params: &SearchParams) -> Result<Results, QueryError> {
    if query_text.trim().is_empty() {
        return Err(QueryError::EmptyQuery);
    }

    let rewritten = inject_pattern(query_text, &params.pattern);

    let conn = pool.get()?;
    let mut statement = conn.prepare(&rewritten)?;
    let column_names: Vec<String> = statement.column_names().iter().map(|s| s.to_string()).collect();
    let rows = statement.query([])?;
    Ok(Results::collect(rows, column_names)?)
}

/// The external Query API's request envelope: `{"query": "<base64 SQL>"}`
/// plus a `pattern` query-string parameter. Defined here so an HTTP layer
/// (out of scope for this crate) can be a thin adapter around `search`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request body was not valid JSON: {0}")]
    InvalidJson(String),
    #[error("query was not valid base64: {0}")]
    InvalidBase64(String),
    #[error("query was not valid UTF-8: {0}")]
    InvalidUtf8(String),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl QueryRequest {
    /// Decodes a JSON request body into plain SQL text, the base64 decode
    /// step the external Query API contract requires before the text ever
    /// reaches `search`.
    pub fn decode(body: &[u8]) -> Result<String, ApiError> {
        let request: QueryRequest =
            serde_json::from_slice(body).map_err(|e| ApiError::InvalidJson(e.to_string()))?;
        let decoded = STANDARD
            .decode(request.query.as_bytes())
            .map_err(|e| ApiError::InvalidBase64(e.to_string()))?;
        String::from_utf8(decoded).map_err(|e| ApiError::InvalidUtf8(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn empty_pattern_does_not_alter_query() {
        let query = "SELECT * FROM ach_entries WHERE amount > 0";
        assert_eq!(inject_pattern(query, ""), query);
    }

    #[test]
    fn pattern_prefixes_every_where() {
        let query = "SELECT * FROM ach_entries WHERE amount > 0";
        assert_eq!(
            inject_pattern(query, "ppd-debit"),
            "SELECT * FROM ach_entries WHERE filename LIKE '%ppd-debit%' AND amount > 0"
        );
    }

    #[test]
    fn pattern_is_case_insensitive_on_where_token() {
        let query = "select * from ach_entries where amount > 0";
        assert_eq!(
            inject_pattern(query, "x"),
            "select * from ach_entries where filename LIKE '%x%' AND amount > 0"
        );
    }

    #[test]
    fn empty_query_text_is_rejected() {
        let pool = schema::open_in_memory().unwrap();
        let err = search(&pool, "   ", &SearchParams::default()).unwrap_err();
        assert!(matches!(err, QueryError::EmptyQuery));
    }

    #[test]
    fn search_returns_matching_header_width() {
        let pool = schema::open_in_memory().unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO ach_files (file_id, filename) VALUES ('f1', 'ppd-debit.ach')",
                [],
            )
            .unwrap();
        }
        let results = search(
            &pool,
            "SELECT file_id, filename FROM ach_files",
            &SearchParams::default(),
        )
        .unwrap();
        assert_eq!(results.headers, vec!["file_id", "filename"]);
        assert_eq!(results.rows.len(), 1);
        assert_eq!(results.rows[0].len(), 2);
    }

    #[test]
    fn query_request_decodes_base64_sql() {
        let sql = "SELECT 1";
        let body = serde_json::json!({ "query": STANDARD.encode(sql) }).to_string();
        let decoded = QueryRequest::decode(body.as_bytes()).unwrap();
        assert_eq!(decoded, sql);
    }
}
