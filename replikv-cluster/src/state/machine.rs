//! Command application logic.

use crate::command::Command;
use crate::error::DecodeError;
use std::io::Read;
use std::sync::Arc;

use super::snapshot::SnapshotImage;
use super::{ApplyResult, KeyValueMap};

/// Applies committed commands to the shared key-value map.
///
/// This is the only writer of the map. Applying the same ordered entries on
/// two adapters yields identical maps.
#[derive(Debug, Clone)]
pub struct KvStateMachine {
    map: Arc<KeyValueMap>,
}

impl KvStateMachine {
    /// Create an adapter over `map`.
    pub fn new(map: Arc<KeyValueMap>) -> Self {
        Self { map }
    }

    /// The map this adapter writes to.
    pub fn map(&self) -> &Arc<KeyValueMap> {
        &self.map
    }

    /// Apply one committed entry.
    ///
    /// An entry that does not decode is logged and rejected; the map is not
    /// touched and later entries keep applying.
    pub fn apply(&self, raw: &[u8]) -> ApplyResult {
        let cmd = match Command::decode(raw) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    payload = %String::from_utf8_lossy(raw),
                    "skipping undecodable log entry"
                );
                return ApplyResult::Rejected {
                    reason: e.to_string(),
                };
            }
        };

        let mut map = self.map.lock();
        match cmd {
            Command::Set { key, value } => {
                map.insert(key, value);
            }
            Command::Delete { key } => {
                map.remove(&key);
            }
        }
        ApplyResult::Applied
    }

    /// Capture the current map.
    pub fn snapshot(&self) -> SnapshotImage {
        let map = self.map.lock();
        SnapshotImage::from_entries(map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Replace the whole map with `image`.
    pub fn restore(&self, image: SnapshotImage) {
        let mut map = self.map.lock();
        map.clear();
        map.extend(image.into_entries());
    }

    /// Decode a persisted image from `reader` and restore it.
    ///
    /// On a decode failure the map is left as it was.
    pub fn restore_from<R: Read>(&self, reader: R) -> Result<(), DecodeError> {
        let image = SnapshotImage::read_from(reader)?;
        self.restore(image);
        Ok(())
    }
}
