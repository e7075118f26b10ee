//! Persistence of the highest total power ever observed.
//!
//! Records are never modified in place. With [`WatermarkPolicy::Append`] every fetch cycle
//! adds a line; with [`WatermarkPolicy::Upsert`] the store holds only the newest record.

use crate::error::Error;
use crate::model::{AggregateSnapshot, WatermarkPolicy, WatermarkRecord, Watts};
use crate::settings::Settings;
use chrono::Utc;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub trait WatermarkStore: Send + Sync {
    /// Most recently inserted record, `None` for an empty store.
    fn latest(&self) -> Result<Option<WatermarkRecord>, Error>;

    /// Persist a record whose maximum is `max(prior_max, snapshot.total_power_watts)`.
    fn append(&self, snapshot: &AggregateSnapshot, prior_max: Watts)
        -> Result<WatermarkRecord, Error>;

    /// Read the current maximum and append a record reflecting it, as one atomic step.
    fn record(&self, snapshot: &AggregateSnapshot) -> Result<WatermarkRecord, Error>;
}

fn new_record(snapshot: &AggregateSnapshot, prior_max: Watts) -> WatermarkRecord {
    WatermarkRecord {
        max_power_watts: prior_max.max(snapshot.total_power_watts),
        total_energy_total_wh: snapshot.total_energy_total_wh,
        total_energy_daily_wh: snapshot.total_energy_daily_wh,
        recorded_at: Utc::now(),
    }
}

fn prior_max(latest: Option<&WatermarkRecord>) -> Watts {
    latest.map(|r| r.max_power_watts).unwrap_or(0.0)
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, Error> {
    mutex
        .lock()
        .map_err(|_| Error::PersistenceUnavailable("watermark lock poisoned".to_string()))
}

fn io_err(path: &Path, e: io::Error) -> Error {
    Error::PersistenceUnavailable(format!("{}: {}", path.display(), e))
}

/// JSON-lines file store, one [`WatermarkRecord`] per line.
///
/// The newest record is cached after the first read, so the file is scanned at most once per
/// process. All access goes through the cache mutex.
pub struct FileStore {
    path: PathBuf,
    policy: WatermarkPolicy,
    /// `None` until the file has been read, then the newest record (if any).
    latest: Mutex<Option<Option<WatermarkRecord>>>,
}

impl FileStore {
    /// Does not touch the disk; the file and its directory are created on first write.
    pub fn new<P: Into<PathBuf>>(path: P, policy: WatermarkPolicy) -> Self {
        FileStore {
            path: path.into(),
            policy,
            latest: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        FileStore::new(&settings.store_path, settings.watermark_policy)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_latest(&self) -> Result<Option<WatermarkRecord>, Error> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&self.path, e)),
        };

        let mut latest = None;
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| io_err(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WatermarkRecord>(&line) {
                Ok(record) => latest = Some(record),
                Err(e) => log::warn!(
                    "Skipping unreadable watermark record at {}:{}: {}",
                    self.path.display(),
                    n + 1,
                    e
                ),
            }
        }
        Ok(latest)
    }

    /// Cached newest record, loading it from disk on first use.
    fn cached(
        &self,
        cache: &mut Option<Option<WatermarkRecord>>,
    ) -> Result<Option<WatermarkRecord>, Error> {
        if let Some(latest) = cache {
            return Ok(latest.clone());
        }
        let latest = self.read_latest()?;
        *cache = Some(latest.clone());
        Ok(latest)
    }

    fn write(&self, record: &WatermarkRecord) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }

        let mut line = serde_json::to_string(record)
            .map_err(|e| Error::PersistenceUnavailable(e.to_string()))?;
        line.push('\n');

        match self.policy {
            WatermarkPolicy::Append => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .read(true)
                    .append(true)
                    .open(&self.path)
                    .map_err(|e| io_err(&self.path, e))?;
                /* a torn last line must not swallow the new record */
                if !ends_with_newline(&mut file).map_err(|e| io_err(&self.path, e))? {
                    line.insert(0, '\n');
                }
                file.write_all(line.as_bytes())
                    .and_then(|_| file.flush())
                    .map_err(|e| io_err(&self.path, e))
            }
            WatermarkPolicy::Upsert => {
                let tmp = self.path.with_extension("tmp");
                fs::write(&tmp, line.as_bytes()).map_err(|e| io_err(&tmp, e))?;
                fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))
            }
        }
    }
}

/// Empty files count as terminated.
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl WatermarkStore for FileStore {
    fn latest(&self) -> Result<Option<WatermarkRecord>, Error> {
        let mut cache = lock(&self.latest)?;
        self.cached(&mut cache)
    }

    fn append(
        &self,
        snapshot: &AggregateSnapshot,
        prior_max: Watts,
    ) -> Result<WatermarkRecord, Error> {
        let mut cache = lock(&self.latest)?;
        let record = new_record(snapshot, prior_max);
        self.write(&record)?;
        *cache = Some(Some(record.clone()));
        Ok(record)
    }

    fn record(&self, snapshot: &AggregateSnapshot) -> Result<WatermarkRecord, Error> {
        let mut cache = lock(&self.latest)?;
        let record = new_record(snapshot, prior_max(self.cached(&mut cache)?.as_ref()));
        self.write(&record)?;
        *cache = Some(Some(record.clone()));
        Ok(record)
    }
}

/// Process-local store with the same semantics as [`FileStore`].
pub struct MemoryStore {
    policy: WatermarkPolicy,
    records: Mutex<Vec<WatermarkRecord>>,
}

impl MemoryStore {
    pub fn new(policy: WatermarkPolicy) -> Self {
        MemoryStore {
            policy,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Copy of everything stored, oldest first.
    pub fn records(&self) -> Result<Vec<WatermarkRecord>, Error> {
        Ok(lock(&self.records)?.clone())
    }

    fn push(&self, records: &mut Vec<WatermarkRecord>, record: WatermarkRecord) {
        if self.policy == WatermarkPolicy::Upsert {
            records.clear();
        }
        records.push(record);
    }
}

impl WatermarkStore for MemoryStore {
    fn latest(&self) -> Result<Option<WatermarkRecord>, Error> {
        Ok(lock(&self.records)?.last().cloned())
    }

    fn append(
        &self,
        snapshot: &AggregateSnapshot,
        prior_max: Watts,
    ) -> Result<WatermarkRecord, Error> {
        let mut records = lock(&self.records)?;
        let record = new_record(snapshot, prior_max);
        self.push(&mut records, record.clone());
        Ok(record)
    }

    fn record(&self, snapshot: &AggregateSnapshot) -> Result<WatermarkRecord, Error> {
        let mut records = lock(&self.records)?;
        let record = new_record(snapshot, prior_max(records.last()));
        self.push(&mut records, record.clone());
        Ok(record)
    }
}
