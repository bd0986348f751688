use crate::error::StoreError;
use crate::record::{Record, RecordId, RecordStatus};

/// Append/update-only record persistence.
///
/// - `insert()`: persists a freshly received record and returns its id.
/// - `update_status()`: advances a stored record. Implementations reject
///   transitions the status DAG does not allow. When `rendered` is given it
///   replaces the stored rendered payload.
/// - `fetch_by_status()`: every stored record currently in `status`,
///   in insertion order.
///
/// Records are never deleted through this interface.
pub trait RecordStore: Send + Sync {
    fn insert(&self, record: &Record) -> Result<RecordId, StoreError>;

    fn update_status(
        &self,
        id: RecordId,
        status: RecordStatus,
        rendered: Option<&str>,
    ) -> Result<(), StoreError>;

    fn fetch_by_status(&self, status: RecordStatus) -> Result<Vec<Record>, StoreError>;
}
