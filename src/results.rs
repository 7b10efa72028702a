//! The Results Model: a headers-and-rows container with heterogeneous cell
//! types, built straight off whatever `rusqlite` hands back so the Query
//! Router never has to know the schema ahead of time.

use rusqlite::types::ValueRef;
use rusqlite::{Row as SqlRow, Rows};
use serde::{Deserialize, Serialize};

/// One scalar value as returned by the embedded engine. Numeric aggregates
/// over the integer-cents `amount` column stay `Integer` rather than being
/// coerced to a float, preserving exactness.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(#[serde(with = "base64_bytes")] Vec<u8>),
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

impl From<ValueRef<'_>> for Cell {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(f) => Cell::Real(f),
            ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
        }
    }
}

pub type Row = Vec<Cell>;

/// An ordered header row plus an ordered list of data rows. Every row's
/// cell count equals the header width.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Results {
    pub(crate) fn push_row(&mut self, row: &SqlRow) {
        let count = row.as_ref().column_count();
        let cells = (0..count)
            .map(|i| row.get_ref_unwrap(i).into())
            .collect();
        self.rows.push(cells);
    }

    /// Consumes a `rusqlite::Rows` iterator into a `Results`, deriving
    /// headers from the statement's column names (available even if zero
    /// rows are returned).
    pub(crate) fn collect(
        mut rows: Rows,
        column_names: Vec<String>,
    ) -> Result<Results, rusqlite::Error> {
        let mut results = Results {
            headers: column_names,
            rows: Vec::new(),
        };
        while let Some(row) = rows.next()? {
            results.push_row(row);
        }
        Ok(results)
    }
}
