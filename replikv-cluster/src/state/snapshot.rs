//! Point-in-time copy of the key-value map.

use crate::error::{DecodeError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// Immutable deep copy of the map, ordered so the encoding is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotImage {
    entries: BTreeMap<String, String>,
}

impl SnapshotImage {
    /// Build an image from key-value pairs.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a key in the image.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Number of keys captured.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the image is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate the captured pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn into_entries(self) -> BTreeMap<String, String> {
        self.entries
    }

    /// Encode the image as a JSON object.
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.entries)?)
    }

    /// Read an image written by [`SnapshotImage::to_bytes`].
    pub fn read_from<R: Read>(reader: R) -> Result<Self, DecodeError> {
        serde_json::from_reader(reader).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}
