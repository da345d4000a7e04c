//! CSV export of the flat logs.
//!
//! Files are written with headers and synced to disk before returning.

use crate::{FastingLog, LogEntry, Result};
use std::fs::File;
use std::path::Path;

/// A row in the calorie log export
#[derive(Debug, serde::Serialize)]
struct EntryRow {
    id: String,
    kind: String,
    name: String,
    calories: f64,
    logged_at: String,
    activity_subtype: Option<String>,
}

impl From<&LogEntry> for EntryRow {
    fn from(entry: &LogEntry) -> Self {
        EntryRow {
            id: entry.id.to_string(),
            kind: entry.kind.to_string(),
            name: entry.name.clone(),
            calories: entry.calories,
            logged_at: entry.logged_at.to_rfc3339(),
            activity_subtype: entry.activity_subtype.as_ref().map(|s| s.to_string()),
        }
    }
}

/// A row in the fasting history export
#[derive(Debug, serde::Serialize)]
struct FastingRow {
    id: String,
    started_at: String,
    ended_at: String,
    duration_minutes: i64,
}

impl From<&FastingLog> for FastingRow {
    fn from(log: &FastingLog) -> Self {
        FastingRow {
            id: log.id.to_string(),
            started_at: log.started_at.to_rfc3339(),
            ended_at: log.ended_at.to_rfc3339(),
            duration_minutes: log.duration().num_minutes(),
        }
    }
}

fn write_rows<T, R>(items: &[T], path: &Path) -> Result<usize>
where
    R: serde::Serialize + for<'a> From<&'a T>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for item in items {
        writer.serialize(R::from(item))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} rows to {:?}", items.len(), path);
    Ok(items.len())
}

/// Write calorie entries to `path`, in the order given
pub fn export_entries_csv(entries: &[LogEntry], path: &Path) -> Result<usize> {
    write_rows::<LogEntry, EntryRow>(entries, path)
}

/// Write completed fasts to `path`, in the order given
pub fn export_fasting_csv(logs: &[FastingLog], path: &Path) -> Result<usize> {
    write_rows::<FastingLog, FastingRow>(logs, path)
}
