//! On-disk state behind the log store.

use crate::types::{StoreEntry, StoreLogId, StoreVote};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const LOG_FILE: &str = "log.ndjson";
const VOTE_FILE: &str = "vote.json";
const META_FILE: &str = "meta.json";

/// Persisted log metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogMeta {
    pub last_purged_log_id: Option<StoreLogId>,
    pub committed: Option<StoreLogId>,
}

/// Log entries, vote and metadata for one node.
pub struct LogStoreInner {
    dir: PathBuf,
    /// In-memory copy of every unpurged entry.
    pub logs: BTreeMap<u64, StoreEntry>,
    pub meta: LogMeta,
    pub vote: Option<StoreVote>,
    writer: Option<BufWriter<File>>,
}

impl LogStoreInner {
    /// Load whatever is already in `dir`.
    pub fn load(dir: PathBuf) -> Result<Self, std::io::Error> {
        let mut inner = Self {
            vote: read_json(&dir.join(VOTE_FILE))?,
            meta: read_json(&dir.join(META_FILE))?.unwrap_or_default(),
            logs: BTreeMap::new(),
            writer: None,
            dir,
        };
        inner.load_entries()?;
        Ok(inner)
    }

    fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    fn load_entries(&mut self) -> Result<(), std::io::Error> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(());
        }

        let purged = self.meta.last_purged_log_id.map(|id| id.index);
        let lines: Vec<String> = BufReader::new(File::open(&path)?)
            .lines()
            .collect::<Result<_, _>>()?;
        let last_line = lines.len().saturating_sub(1);
        let mut torn = false;

        for (n, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoreEntry>(line) {
                Ok(entry) => {
                    if purged.is_some_and(|p| entry.log_id.index <= p) {
                        continue;
                    }
                    self.logs.insert(entry.log_id.index, entry);
                }
                // A crash mid-append leaves a partial final line.
                Err(e) if n == last_line => {
                    tracing::warn!(error = %e, "dropping torn log entry at end of log");
                    torn = true;
                }
                Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            }
        }

        if torn {
            self.rewrite_log()?;
        }
        Ok(())
    }

    /// Append entries and fsync.
    pub fn append(&mut self, entries: Vec<StoreEntry>) -> Result<(), std::io::Error> {
        if entries.is_empty() {
            return Ok(());
        }

        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.log_path())?;
            self.writer = Some(BufWriter::new(file));
        }

        if let Some(writer) = self.writer.as_mut() {
            for entry in &entries {
                let line = serde_json::to_string(entry)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                writeln!(writer, "{line}")?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        for entry in entries {
            self.logs.insert(entry.log_id.index, entry);
        }
        Ok(())
    }

    /// Drop entries at and after `log_id`.
    pub fn truncate(&mut self, log_id: StoreLogId) -> Result<(), std::io::Error> {
        let _ = self.logs.split_off(&log_id.index);
        self.rewrite_log()
    }

    /// Drop entries up to and including `log_id`.
    pub fn purge(&mut self, log_id: StoreLogId) -> Result<(), std::io::Error> {
        self.meta.last_purged_log_id = Some(log_id);
        self.save_meta()?;

        self.logs = self.logs.split_off(&(log_id.index + 1));
        self.rewrite_log()
    }

    pub fn save_vote(&mut self, vote: &StoreVote) -> Result<(), std::io::Error> {
        write_json_atomic(&self.dir, VOTE_FILE, vote)?;
        self.vote = Some(*vote);
        Ok(())
    }

    pub fn save_meta(&self) -> Result<(), std::io::Error> {
        write_json_atomic(&self.dir, META_FILE, &self.meta)
    }

    /// Replace the log file with the in-memory entries.
    fn rewrite_log(&mut self) -> Result<(), std::io::Error> {
        self.writer = None;

        let tmp_path = self.dir.join(format!("{LOG_FILE}.tmp"));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for entry in self.logs.values() {
            let line = serde_json::to_string(entry)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;

        fs::rename(&tmp_path, self.log_path())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, std::io::Error> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn write_json_atomic<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<(), std::io::Error> {
    let path = dir.join(name);
    let temp_path = dir.join(format!("{name}.tmp"));

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    fs::rename(&temp_path, &path)
}
