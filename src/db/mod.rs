mod backup;
mod file;
mod reconcile;
mod record;
mod summary;

#[cfg(test)]
pub(crate) mod testutils;

pub use backup::{parse_backup, render_backup};
pub use file::{BlobStore, FileBlobStore, LedgerStore, LEDGER_KEY};
pub use reconcile::{claimed_filenames, delete_by_id, import_batch, merge_by_identity, BatchOutcome};
pub use record::{Provenance, Record, RecordId, Source, MANUAL_RECORD_TITLE};
pub use summary::{total, TimeRange};
