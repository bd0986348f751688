use std::collections::VecDeque;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rosetta_api::{Record, RecordId, RecordStatus, RecordStore, StoreError};

pub fn default_max_records() -> usize {
    100_000
}

struct Inner {
    records: VecDeque<Record>,
    next_id: u64,
}

// ═══════════════════════════════════════════════════════════════
//  MemoryRecordStore
// ═══════════════════════════════════════════════════════════════

/// In-memory ring buffer. Once `max_records` is reached the oldest record
/// is evicted; later updates to it report `NotFound`.
pub struct MemoryRecordStore {
    inner: RwLock<Inner>,
    max_records: usize,
}

impl MemoryRecordStore {
    pub fn new(max_records: usize) -> Self {
        let max_records = max_records.max(1);
        Self {
            inner: RwLock::new(Inner {
                records: VecDeque::with_capacity(max_records.min(65536)),
                next_id: 1,
            }),
            max_records,
        }
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: RecordId) -> Option<Record> {
        let inner = self.read();
        position(&inner.records, id).map(|i| inner.records[i].clone())
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new(default_max_records())
    }
}

/// Records are kept in id order, so lookup is a binary search.
fn position(records: &VecDeque<Record>, id: RecordId) -> Option<usize> {
    records.binary_search_by_key(&Some(id), Record::id).ok()
}

impl RecordStore for MemoryRecordStore {
    fn insert(&self, record: &Record) -> Result<RecordId, StoreError> {
        let mut inner = self.write();
        let id = RecordId(inner.next_id);
        inner.next_id += 1;

        let mut stored = record.clone();
        stored.assign_id(id);
        if inner.records.len() >= self.max_records {
            inner.records.pop_front();
        }
        inner.records.push_back(stored);
        Ok(id)
    }

    fn update_status(&self, id: RecordId, status: RecordStatus, rendered: Option<&str>) -> Result<(), StoreError> {
        let mut inner = self.write();
        let i = position(&inner.records, id).ok_or(StoreError::NotFound(id))?;
        super::apply_update(&mut inner.records[i], id, status, rendered)
    }

    fn fetch_by_status(&self, status: RecordStatus) -> Result<Vec<Record>, StoreError> {
        Ok(self.read().records.iter().filter(|r| r.status() == status).cloned().collect())
    }
}
