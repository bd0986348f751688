//! Record persistence backends.
//!
//! - [`MemoryRecordStore`]: bounded ring buffer, lost on exit.
//! - [`FileRecordStore`]: JSON Lines journal replayed on open.

mod file;
mod memory;

pub use file::FileRecordStore;
pub use memory::{MemoryRecordStore, default_max_records};

use rosetta_api::{Record, RecordId, RecordStatus, StoreError};

/// Apply an update to a stored record, mapping a DAG violation to the
/// store error both backends report.
pub(crate) fn apply_update(
    record: &mut Record,
    id: RecordId,
    status: RecordStatus,
    rendered: Option<&str>,
) -> Result<(), StoreError> {
    record
        .apply_update(status, rendered)
        .map_err(|source| StoreError::InvalidTransition { id, source })
}
