//! OpenRaft state machine and snapshot builder.

use crate::command::EncodedCommand;
use crate::error::{StoreError, StoreResult};
use crate::raft::snapshot_store::SnapshotStore;
use crate::types::{
    StoreLogId, StoreMembership, StoreSnapshot, StoreSnapshotMeta, StoreStorageError, TypeConfig,
};
use openraft::storage::RaftStateMachine;
use openraft::{EntryPayload, RaftSnapshotBuilder, RaftTypeConfig, StorageIOError, StoredMembership};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::machine::KvStateMachine;
use super::snapshot::SnapshotImage;
use super::ApplyResult;

/// Log position and membership reflected in the map.
#[derive(Debug, Clone, Default)]
struct AppliedState {
    last_applied_log: Option<StoreLogId>,
    last_membership: StoreMembership,
}

/// A snapshot held in memory for OpenRaft to serve.
#[derive(Debug, Clone)]
struct StoredSnapshot {
    meta: StoreSnapshotMeta,
    data: Vec<u8>,
}

/// The state machine handed to OpenRaft.
///
/// Wraps the [`KvStateMachine`] adapter with the bookkeeping OpenRaft needs.
/// `applied` is always locked before the map, both when applying and when
/// capturing a snapshot, so a snapshot's image and log id describe the same
/// instant.
#[derive(Debug)]
pub struct StateMachineStore {
    machine: KvStateMachine,
    applied: Mutex<AppliedState>,
    snapshot_idx: AtomicU64,
    current_snapshot: Mutex<Option<StoredSnapshot>>,
    snapshots: Option<SnapshotStore>,
}

impl StateMachineStore {
    /// Create a state machine without snapshot persistence.
    pub fn new(machine: KvStateMachine) -> Self {
        Self {
            machine,
            applied: Mutex::new(AppliedState::default()),
            snapshot_idx: AtomicU64::new(0),
            current_snapshot: Mutex::new(None),
            snapshots: None,
        }
    }

    /// Create a state machine backed by `snapshots`, restoring the newest
    /// readable snapshot found there.
    pub fn open(machine: KvStateMachine, snapshots: SnapshotStore) -> Result<Self, std::io::Error> {
        let mut store = Self::new(machine);

        if let Some(persisted) = snapshots.latest()? {
            let image = SnapshotImage::read_from(&persisted.data[..])
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

            tracing::info!(
                snapshot_id = %persisted.meta.snapshot_id,
                keys = image.len(),
                "restoring state from snapshot"
            );

            store.machine.restore(image);
            *store.applied.get_mut() = AppliedState {
                last_applied_log: persisted.meta.last_log_id,
                last_membership: persisted.meta.last_membership.clone(),
            };
            *store.current_snapshot.get_mut() = Some(StoredSnapshot {
                meta: persisted.meta,
                data: persisted.data,
            });
        }

        store.snapshots = Some(snapshots);
        Ok(store)
    }

    /// The adapter applying commands.
    pub fn machine(&self) -> &KvStateMachine {
        &self.machine
    }

    /// Last log id applied to the map.
    pub fn last_applied(&self) -> Option<StoreLogId> {
        self.applied.lock().last_applied_log
    }

    fn apply_entry(&self, entry: openraft::Entry<TypeConfig>) -> ApplyResult {
        tracing::debug!(%entry.log_id, "applying to state machine");

        let mut applied = self.applied.lock();
        applied.last_applied_log = Some(entry.log_id);

        match entry.payload {
            EntryPayload::Blank => ApplyResult::Applied,
            EntryPayload::Normal(EncodedCommand(raw)) => self.machine.apply(&raw),
            EntryPayload::Membership(membership) => {
                applied.last_membership = StoredMembership::new(Some(entry.log_id), membership);
                ApplyResult::Applied
            }
        }
    }

    /// Write a snapshot to the file store.
    ///
    /// A failed write is cancelled so no partial snapshot is left behind.
    fn persist(&self, snapshot: &StoredSnapshot) -> StoreResult<()> {
        let Some(snapshots) = &self.snapshots else {
            return Ok(());
        };
        let id = &snapshot.meta.snapshot_id;

        let mut sink = snapshots.create(&snapshot.meta).map_err(|e| {
            StoreError::Persistence(format!("cannot create snapshot {id}: {e}"))
        })?;

        if let Err(e) = sink.write(&snapshot.data) {
            sink.cancel();
            return Err(StoreError::Persistence(format!(
                "cannot write snapshot {id}: {e}"
            )));
        }

        sink.commit()
            .map_err(|e| StoreError::Persistence(format!("cannot commit snapshot {id}: {e}")))
    }

    /// Keep `snapshot` in memory, persisting it first.
    ///
    /// Persistence failures are logged; the in-memory snapshot stays
    /// available either way.
    fn keep(&self, snapshot: StoredSnapshot) {
        if let Err(e) = self.persist(&snapshot) {
            tracing::error!(
                snapshot_id = %snapshot.meta.snapshot_id,
                error = %e,
                "failed to persist snapshot"
            );
        }
        *self.current_snapshot.lock() = Some(snapshot);
    }
}

impl RaftSnapshotBuilder<TypeConfig> for Arc<StateMachineStore> {
    async fn build_snapshot(&mut self) -> Result<StoreSnapshot, StoreStorageError> {
        let (image, applied) = {
            let applied = self.applied.lock();
            (self.machine.snapshot(), applied.clone())
        };

        let snapshot_idx = self.snapshot_idx.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot_id = match applied.last_applied_log {
            Some(last) => format!("{}-{}-{}", last.leader_id, last.index, snapshot_idx),
            None => format!("--{snapshot_idx}"),
        };

        let meta = StoreSnapshotMeta {
            last_log_id: applied.last_applied_log,
            last_membership: applied.last_membership,
            snapshot_id,
        };
        let data = image
            .to_bytes()
            .map_err(|e| StorageIOError::write_snapshot(Some(meta.signature()), &e))?;

        tracing::info!(
            snapshot_id = %meta.snapshot_id,
            keys = image.len(),
            "built snapshot"
        );

        self.keep(StoredSnapshot {
            meta: meta.clone(),
            data: data.clone(),
        });

        Ok(StoreSnapshot {
            meta,
            snapshot: Box::new(Cursor::new(data)),
        })
    }
}

impl RaftStateMachine<TypeConfig> for Arc<StateMachineStore> {
    type SnapshotBuilder = Self;

    async fn applied_state(
        &mut self,
    ) -> Result<(Option<StoreLogId>, StoreMembership), StoreStorageError> {
        let applied = self.applied.lock();
        Ok((applied.last_applied_log, applied.last_membership.clone()))
    }

    async fn apply<I>(&mut self, entries: I) -> Result<Vec<ApplyResult>, StoreStorageError>
    where
        I: IntoIterator<Item = openraft::Entry<TypeConfig>> + Send,
    {
        Ok(entries
            .into_iter()
            .map(|entry| self.apply_entry(entry))
            .collect())
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        Arc::clone(self)
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> Result<Box<<TypeConfig as RaftTypeConfig>::SnapshotData>, StoreStorageError> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &StoreSnapshotMeta,
        snapshot: Box<<TypeConfig as RaftTypeConfig>::SnapshotData>,
    ) -> Result<(), StoreStorageError> {
        let data = snapshot.into_inner();
        tracing::info!(
            snapshot_id = %meta.snapshot_id,
            snapshot_size = data.len(),
            "installing snapshot"
        );

        // Decode before touching anything so a bad image leaves the map intact.
        let image = SnapshotImage::read_from(&data[..])
            .map_err(|e| StorageIOError::read_snapshot(Some(meta.signature()), &e))?;

        {
            let mut applied = self.applied.lock();
            self.machine.restore(image);
            applied.last_applied_log = meta.last_log_id;
            applied.last_membership = meta.last_membership.clone();
        }

        self.keep(StoredSnapshot {
            meta: meta.clone(),
            data,
        });
        Ok(())
    }

    async fn get_current_snapshot(&mut self) -> Result<Option<StoreSnapshot>, StoreStorageError> {
        Ok(self
            .current_snapshot
            .lock()
            .as_ref()
            .map(|snapshot| StoreSnapshot {
                meta: snapshot.meta.clone(),
                snapshot: Box::new(Cursor::new(snapshot.data.clone())),
            }))
    }
}
