//! Keyed record persistence.
//!
//! Each of the five records is stored as its own JSON document. Loading never
//! fails because of bad data: a missing, unreadable or unparseable record
//! falls back to its default and the failure is logged.

use crate::{Error, FastingLog, FastingState, LastReset, LogEntry, Result, UserProfile};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// A persisted record with its storage key and fallback value
pub trait Record: Serialize + DeserializeOwned + Default {
    const KEY: &'static str;
}

impl Record for UserProfile {
    const KEY: &'static str = "profile";
}

impl Record for Vec<LogEntry> {
    const KEY: &'static str = "calorie_logs";
}

impl Record for Vec<FastingLog> {
    const KEY: &'static str = "fasting_logs";
}

impl Record for FastingState {
    const KEY: &'static str = "fasting_state";
}

impl Record for LastReset {
    const KEY: &'static str = "last_reset";
}

/// Raw key-value storage underneath the typed records
pub trait RecordStore {
    /// Contents stored under `key`, or `None` if nothing is stored
    fn load_raw(&self, key: &str) -> Result<Option<String>>;

    /// Replace the contents stored under `key`
    fn save_raw(&self, key: &str, contents: &str) -> Result<()>;

    /// Read, transform and write `key` without letting another writer in
    /// between. `apply` receives the current contents and returns the new
    /// contents, or `None` to leave the record as it is.
    ///
    /// `apply` must not touch the store itself.
    fn update_raw(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()>;
}

/// Load a record, falling back to its default on any failure
pub fn load<R: Record, S: RecordStore + ?Sized>(store: &S) -> R {
    match store.load_raw(R::KEY) {
        Ok(contents) => decode(contents),
        Err(e) => {
            tracing::warn!("Unable to read {} record: {}. Using default.", R::KEY, e);
            R::default()
        }
    }
}

/// Modify a record in place while holding its write lock.
///
/// `apply` works on the freshly stored value, so changes made by other
/// processes since this one loaded are kept. Returning `Ok(None)` skips the
/// write. Gives back the record as it now stands and `apply`'s output.
pub fn update<R, S, T, F>(store: &S, apply: F) -> Result<(R, Option<T>)>
where
    R: Record,
    S: RecordStore + ?Sized,
    F: FnOnce(&mut R) -> Result<Option<T>>,
{
    let mut apply = Some(apply);
    let mut outcome = None;

    store.update_raw(R::KEY, &mut |contents: Option<String>| -> Result<Option<String>> {
        let apply = apply
            .take()
            .ok_or_else(|| Error::Other(format!("{} update applied twice", R::KEY)))?;
        let mut record: R = decode(contents);
        let output = apply(&mut record)?;
        let written = if output.is_some() {
            Some(serde_json::to_string(&record)?)
        } else {
            None
        };
        outcome = Some((record, output));
        Ok(written)
    })?;

    let (record, output) =
        outcome.ok_or_else(|| Error::Other(format!("{} update was not applied", R::KEY)))?;
    if output.is_some() {
        tracing::debug!("Updated {} record", R::KEY);
    }
    Ok((record, output))
}

fn decode<R: Record>(contents: Option<String>) -> R {
    let Some(contents) = contents else {
        tracing::info!("No stored {} record, using default", R::KEY);
        return R::default();
    };

    match serde_json::from_str::<R>(&contents) {
        Ok(record) => {
            tracing::debug!("Loaded {} record", R::KEY);
            record
        }
        Err(e) => {
            tracing::warn!("Failed to parse {} record: {}. Using default.", R::KEY, e);
            R::default()
        }
    }
}

/// Serialize and store a record
pub fn save<R: Record, S: RecordStore + ?Sized>(store: &S, record: &R) -> Result<()> {
    let contents = serde_json::to_string(record)?;
    store.save_raw(R::KEY, &contents)?;
    tracing::debug!("Saved {} record", R::KEY);
    Ok(())
}

// ============================================================================
// File-backed store
// ============================================================================

/// One `<key>.json` file per record inside a data directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.lock", key))
    }

    /// Atomically writes a record by:
    /// 1. Writing and syncing a temp file in the same directory
    /// 2. Renaming it over the original
    ///
    /// Callers hold the record's exclusive lock.
    fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        let temp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::trace!("Wrote {:?}", path);
        Ok(())
    }
}

/// Lock on a record's sidecar lock file, released on drop
struct LockGuard {
    file: File,
}

impl LockGuard {
    fn open(path: &Path) -> Result<File> {
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?)
    }

    fn exclusive(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    fn shared(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        file.lock_shared()?;
        Ok(Self { file })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release record lock: {}", e);
        }
    }
}

impl RecordStore for FileStore {
    fn load_raw(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let _guard = LockGuard::shared(&self.lock_path(key))?;
        read_existing(&path)
    }

    fn save_raw(&self, key: &str, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let _guard = LockGuard::exclusive(&self.lock_path(key))?;
        self.write_atomic(&self.path_for(key), contents)
    }

    /// The exclusive lock is taken before the read and held through the
    /// write, on every path.
    fn update_raw(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        let _guard = LockGuard::exclusive(&self.lock_path(key))?;
        let current = read_existing(&path)?;

        match apply(current)? {
            Some(contents) => self.write_atomic(&path, &contents),
            None => Ok(()),
        }
    }
}

fn read_existing(path: &Path) -> Result<Option<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(Some(contents))
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile store, mainly for tests
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw contents, e.g. to simulate a corrupt record
    pub fn insert_raw(&self, key: &str, contents: impl Into<String>) {
        self.lock().insert(key.to_string(), contents.into());
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordStore for MemoryStore {
    fn load_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_raw(key))
    }

    fn save_raw(&self, key: &str, contents: &str) -> Result<()> {
        self.lock().insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn update_raw(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        let mut records = self.lock();
        if let Some(contents) = apply(records.get(key).cloned())? {
            records.insert(key.to_string(), contents);
        }
        Ok(())
    }
}
