//! File-based snapshot store.
//!
//! ## Storage Layout
//!
//! ```text
//! snapshots/
//! ├── 00000000000000000120-1-120-3/      # committed snapshot
//! │   ├── meta.json                      # SnapshotMeta
//! │   └── state.json                     # SnapshotImage
//! ├── 00000000000000000250-1-250-4/
//! └── 00000000000000000300-1-300-5.tmp/  # in progress, never read
//! ```
//!
//! A snapshot is written into a `.tmp` directory through a [`SnapshotSink`]
//! and renamed into place on commit. Only the newest `retain` snapshots are
//! kept.

use crate::state::SnapshotImage;
use crate::types::StoreSnapshotMeta;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const META_FILE: &str = "meta.json";
const STATE_FILE: &str = "state.json";
const TMP_SUFFIX: &str = ".tmp";

/// A snapshot read back from disk.
#[derive(Debug, Clone)]
pub struct PersistedSnapshot {
    /// Snapshot metadata.
    pub meta: StoreSnapshotMeta,
    /// Encoded [`SnapshotImage`].
    pub data: Vec<u8>,
}

/// Directory of persisted snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    retain: usize,
}

impl SnapshotStore {
    /// Open (or create) the snapshot directory, discarding unfinished writes.
    pub fn open(dir: PathBuf, retain: usize) -> Result<Self, std::io::Error> {
        fs::create_dir_all(&dir)?;

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() && is_tmp(&path) {
                tracing::warn!(path = %path.display(), "removing unfinished snapshot");
                fs::remove_dir_all(&path)?;
            }
        }

        Ok(Self {
            dir,
            retain: retain.max(1),
        })
    }

    /// Directory holding the snapshots.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Begin writing a snapshot for `meta`.
    pub fn create(&self, meta: &StoreSnapshotMeta) -> Result<SnapshotSink, std::io::Error> {
        let name = dir_name(meta);
        let final_path = self.dir.join(&name);
        let tmp_path = self.dir.join(format!("{name}{TMP_SUFFIX}"));

        if tmp_path.exists() {
            fs::remove_dir_all(&tmp_path)?;
        }
        fs::create_dir_all(&tmp_path)?;

        write_synced(&tmp_path.join(META_FILE), |w| {
            serde_json::to_writer(w, meta)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        Ok(SnapshotSink {
            tmp_path,
            final_path,
            store: self.clone(),
            done: false,
        })
    }

    /// Committed snapshot directories, oldest first.
    pub fn list(&self) -> Result<Vec<PathBuf>, std::io::Error> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_dir() && !is_tmp(&path) {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Load the newest readable snapshot.
    ///
    /// A snapshot whose files are missing or do not decode is skipped in
    /// favour of the next older one.
    pub fn latest(&self) -> Result<Option<PersistedSnapshot>, std::io::Error> {
        for path in self.list()?.into_iter().rev() {
            match read_snapshot(&path) {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable snapshot"
                    );
                }
            }
        }
        Ok(None)
    }

    /// Remove all but the newest `retain` snapshots.
    fn prune(&self) -> Result<(), std::io::Error> {
        let dirs = self.list()?;
        let excess = dirs.len().saturating_sub(self.retain);
        for path in dirs.into_iter().take(excess) {
            tracing::debug!(path = %path.display(), "pruning old snapshot");
            fs::remove_dir_all(&path)?;
        }
        Ok(())
    }
}

/// An in-progress snapshot write.
///
/// Dropping a sink without calling [`SnapshotSink::commit`] cancels it.
#[derive(Debug)]
pub struct SnapshotSink {
    tmp_path: PathBuf,
    final_path: PathBuf,
    store: SnapshotStore,
    done: bool,
}

impl SnapshotSink {
    /// Write the encoded image.
    pub fn write(&mut self, data: &[u8]) -> Result<(), std::io::Error> {
        write_synced(&self.tmp_path.join(STATE_FILE), |w| w.write_all(data))
    }

    /// Make the snapshot visible and prune old ones.
    pub fn commit(mut self) -> Result<(), std::io::Error> {
        if self.final_path.exists() {
            fs::remove_dir_all(&self.final_path)?;
        }
        fs::rename(&self.tmp_path, &self.final_path)?;
        self.done = true;

        tracing::info!(path = %self.final_path.display(), "snapshot persisted");
        self.store.prune()
    }

    /// Discard the partial snapshot.
    pub fn cancel(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if let Err(e) = fs::remove_dir_all(&self.tmp_path) {
            tracing::warn!(
                path = %self.tmp_path.display(),
                error = %e,
                "failed to remove cancelled snapshot"
            );
        }
    }
}

impl Drop for SnapshotSink {
    fn drop(&mut self) {
        self.discard();
    }
}

fn is_tmp(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TMP_SUFFIX))
}

fn dir_name(meta: &StoreSnapshotMeta) -> String {
    let index = meta.last_log_id.map(|id| id.index).unwrap_or(0);
    let id: String = meta
        .snapshot_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{index:020}-{id}")
}

fn write_synced(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<(), std::io::Error>,
) -> Result<(), std::io::Error> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

fn read_snapshot(path: &Path) -> Result<PersistedSnapshot, std::io::Error> {
    let meta_file = File::open(path.join(META_FILE))?;
    let meta: StoreSnapshotMeta = serde_json::from_reader(BufReader::new(meta_file))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let data = fs::read(path.join(STATE_FILE))?;
    SnapshotImage::read_from(&data[..])
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(PersistedSnapshot { meta, data })
}
