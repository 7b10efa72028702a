//! The Identity Stamper: derives content-addressed identifiers for a parsed
//! file's header, batches, and entries. These identifiers become the
//! primary keys the Relational Schema stores rows under, which is what lets
//! re-ingesting the same file be a no-op rather than a duplicate.

use crate::ach::{Batch, EntryDetail, File};
use crate::sha256_hex;

/// Computes and fills in `id` fields throughout `file`, in place. A record
/// whose `id` is already populated -- e.g. because it was parsed back out of
/// a JSON encoding produced by this crate -- is left untouched rather than
/// re-hashed, so a round trip through JSON can't silently mint new
/// identifiers for data this crate already stamped.
pub fn populate_ids(file: &mut File) -> Result<(), StampError> {
    if file.id.is_empty() {
        file.id = sha256_hex(file.canonical_wire_lines().as_bytes());
    }

    for batch in &mut file.batches {
        populate_batch_ids(batch, &file.id)?;
    }

    Ok(())
}

fn populate_batch_ids(batch: &mut Batch, file_id: &str) -> Result<(), StampError> {
    if batch.id.is_empty() {
        batch.id = sha256_hex(format!("{}{}", file_id, batch.header.to_nacha_line()).as_bytes());
    }

    for entry in &mut batch.entries {
        populate_entry_id(entry, &batch.id)?;
    }

    Ok(())
}

fn populate_entry_id(entry: &mut EntryDetail, batch_id: &str) -> Result<(), StampError> {
    if entry.id.is_empty() {
        entry.id = sha256_hex(format!("{}{}", batch_id, entry.to_nacha_line()).as_bytes());
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StampError {
    #[error("identity stamping failed: {0}")]
    Failed(String),
}
