use rosetta_api::{Record, RecordStatus, RecordStore};
use rosetta_engine::FileRecordStore;

use crate::config::{HistoryArgs, load_config};
use crate::error::CliError;

const ALL: [RecordStatus; 4] = [
    RecordStatus::Received,
    RecordStatus::Transformed,
    RecordStatus::Forwarded,
    RecordStatus::Error,
];

/// Browse the record journal, e.g. to pick inputs for a new template.
pub fn run(args: HistoryArgs) -> Result<(), CliError> {
    let path = match args.journal {
        Some(path) => path,
        None => load_config(args.config.as_deref())?.storage.path,
    };
    if !path.exists() {
        return Err(CliError::Config {
            context: "journal",
            detail: format!("'{}' does not exist", path.display()),
        });
    }
    let store = FileRecordStore::open(&path)?;

    for record in collect(&store, args.status)? {
        if args.json {
            let line = serde_json::to_string(&record).map_err(|e| CliError::Config {
                context: "json",
                detail: e.to_string(),
            })?;
            println!("{line}");
        } else {
            println!("{}", summary(&record));
        }
    }
    Ok(())
}

/// Records in id order, optionally restricted to one status.
fn collect(store: &dyn RecordStore, status: Option<RecordStatus>) -> Result<Vec<Record>, CliError> {
    let statuses = match status {
        Some(status) => vec![status],
        None => ALL.to_vec(),
    };
    let mut records = Vec::new();
    for status in statuses {
        records.extend(store.fetch_by_status(status)?);
    }
    records.sort_by_key(Record::id);
    Ok(records)
}

fn summary(record: &Record) -> String {
    let id = record.id().map(|id| id.to_string()).unwrap_or_else(|| "-".into());
    let payload: String = record.raw_payload().split_whitespace().collect::<Vec<_>>().join(" ");
    format!(
        "{id:<6} {:<11} {} {:<21} {payload}",
        record.status().as_str(),
        record.received_at().format("%Y-%m-%d %H:%M:%S"),
        record.source(),
    )
}
