use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use rosetta_api::{Record, RecordId, RecordStatus, RecordStore, StoreError};

/// One line of the journal.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalEntry {
    Insert {
        record: Record,
    },
    Update {
        id: RecordId,
        status: RecordStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rendered: Option<String>,
    },
}

struct State {
    journal: File,
    index: Index,
}

/// The most recent `max_records` records, as of the last journal line.
struct Index {
    records: BTreeMap<RecordId, Record>,
    max_records: usize,
    /// Highest id dropped from the index. Updates at or below it are
    /// answered from the journal.
    evicted_through: Option<RecordId>,
    next_id: u64,
}

impl Index {
    fn new(max_records: usize) -> Self {
        Self {
            records: BTreeMap::new(),
            max_records: max_records.max(1),
            evicted_through: None,
            next_id: 1,
        }
    }

    fn insert(&mut self, id: RecordId, record: Record) {
        self.next_id = self.next_id.max(id.0 + 1);
        self.records.insert(id, record);
        while self.records.len() > self.max_records {
            if let Some((evicted, _)) = self.records.pop_first() {
                self.evicted_through = self.evicted_through.max(Some(evicted));
            }
        }
    }

    fn is_evicted(&self, id: RecordId) -> bool {
        self.evicted_through.is_some_and(|through| id <= through)
    }

    fn replay(&mut self, line_no: usize, entry: JournalEntry) {
        match entry {
            JournalEntry::Insert { record } => match record.id() {
                Some(id) => self.insert(id, record),
                None => tracing::warn!(line = line_no, "journal insert without id, skipped"),
            },
            JournalEntry::Update { id, status, rendered } => {
                let Some(record) = self.records.get_mut(&id) else {
                    if !self.is_evicted(id) {
                        tracing::warn!(line = line_no, %id, "journal update for unknown record, skipped");
                    }
                    return;
                };
                if let Err(e) = super::apply_update(record, id, status, rendered.as_deref()) {
                    tracing::warn!(line = line_no, error = %e, "journal update rejected, skipped");
                }
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  FileRecordStore
// ════════════════════════════════════════════════════════════════

/// Append-only JSON Lines journal.
///
/// Every insert and update is one line; nothing is ever rewritten. On open
/// the journal is replayed into an index of the most recent `max_records`
/// records. Older records stay on disk: `fetch_by_status` streams the
/// whole journal, and lookups that miss the index fall back to a scan.
pub struct FileRecordStore {
    path: PathBuf,
    state: Mutex<State>,
}

impl FileRecordStore {
    /// Open (or create) the journal at `path` with the default index size.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_bounded(path, super::default_max_records())
    }

    /// Open (or create) the journal at `path`, keeping at most
    /// `max_records` records in memory.
    pub fn open_bounded(path: impl AsRef<Path>, max_records: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("mkdir {}: {e}", parent.display())))?;
        }

        let mut index = Index::new(max_records);
        if path.exists() {
            scan(&path, |line_no, entry| index.replay(line_no, entry))?;
        }

        let journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::Io(format!("open {}: {e}", path.display())))?;

        tracing::info!(
            path = %path.display(),
            indexed = index.records.len(),
            next_id = index.next_id,
            "record journal opened"
        );

        Ok(Self {
            path,
            state: Mutex::new(State { journal, index }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: RecordId) -> Option<Record> {
        let state = self.lock();
        if let Some(record) = state.index.records.get(&id) {
            return Some(record.clone());
        }
        if !state.index.is_evicted(id) {
            return None;
        }
        self.load(id)
            .inspect_err(|e| tracing::warn!(%id, error = %e, "journal lookup failed"))
            .ok()
            .flatten()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Rebuild one record from the journal.
    fn load(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        let mut found: Option<Record> = None;
        scan(&self.path, |_, entry| match entry {
            JournalEntry::Insert { record } if record.id() == Some(id) => found = Some(record),
            JournalEntry::Update { id: target, status, rendered } if target == id => {
                if let Some(record) = found.as_mut() {
                    let _ = super::apply_update(record, id, status, rendered.as_deref());
                }
            }
            _ => {}
        })?;
        Ok(found)
    }
}

/// Feed every well-formed journal line to `visit`; malformed lines are
/// skipped with a warning.
fn scan(path: &Path, mut visit: impl FnMut(usize, JournalEntry)) -> Result<(), StoreError> {
    let f = File::open(path).map_err(|e| StoreError::Io(format!("open {}: {e}", path.display())))?;

    for (n, line) in BufReader::new(f).lines().enumerate() {
        let line = line.map_err(|e| StoreError::Io(format!("read line: {e}")))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(&line) {
            Ok(entry) => visit(n + 1, entry),
            Err(e) => tracing::warn!(line = n + 1, error = %e, "malformed journal line, skipped"),
        }
    }
    Ok(())
}

fn append(journal: &mut File, entry: &JournalEntry) -> Result<(), StoreError> {
    let line = serde_json::to_string(entry).map_err(|e| StoreError::Format(format!("json serialize: {e}")))?;
    writeln!(journal, "{line}").map_err(|e| StoreError::Io(format!("write: {e}")))
}

impl RecordStore for FileRecordStore {
    fn insert(&self, record: &Record) -> Result<RecordId, StoreError> {
        let mut state = self.lock();
        let id = RecordId(state.index.next_id);

        let mut stored = record.clone();
        stored.assign_id(id);
        append(&mut state.journal, &JournalEntry::Insert { record: stored.clone() })?;

        state.index.insert(id, stored);
        Ok(id)
    }

    fn update_status(&self, id: RecordId, status: RecordStatus, rendered: Option<&str>) -> Result<(), StoreError> {
        let mut state = self.lock();
        let indexed = state.index.records.contains_key(&id);
        let current = match state.index.records.get(&id) {
            Some(record) => record.clone(),
            None if state.index.is_evicted(id) => self.load(id)?.ok_or(StoreError::NotFound(id))?,
            None => return Err(StoreError::NotFound(id)),
        };

        // Validate on a copy so a rejected or unwritten update leaves the
        // index untouched.
        let mut updated = current;
        super::apply_update(&mut updated, id, status, rendered)?;
        append(
            &mut state.journal,
            &JournalEntry::Update {
                id,
                status,
                rendered: rendered.map(str::to_string),
            },
        )?;
        if indexed {
            state.index.records.insert(id, updated);
        }
        Ok(())
    }

    /// Two passes over the journal: final status per id, then the matching
    /// records. Only the result is held in memory.
    fn fetch_by_status(&self, status: RecordStatus) -> Result<Vec<Record>, StoreError> {
        let _state = self.lock();

        let mut statuses: HashMap<RecordId, RecordStatus> = HashMap::new();
        scan(&self.path, |_, entry| match entry {
            JournalEntry::Insert { record } => {
                if let Some(id) = record.id() {
                    statuses.insert(id, record.status());
                }
            }
            JournalEntry::Update { id, status: next, .. } => {
                if let Some(current) = statuses.get_mut(&id) {
                    if current.can_advance_to(next) {
                        *current = next;
                    }
                }
            }
        })?;
        statuses.retain(|_, s| *s == status);

        let mut matched: BTreeMap<RecordId, Record> = BTreeMap::new();
        scan(&self.path, |_, entry| match entry {
            JournalEntry::Insert { record } => {
                if let Some(id) = record.id().filter(|id| statuses.contains_key(id)) {
                    matched.insert(id, record);
                }
            }
            JournalEntry::Update { id, status: next, rendered } => {
                if let Some(record) = matched.get_mut(&id) {
                    let _ = super::apply_update(record, id, next, rendered.as_deref());
                }
            }
        })?;
        Ok(matched.into_values().collect())
    }
}
