//! Connection index (`bag.json`).
//!
//! Maps the connection id stored in every record header to the topic and
//! message type it was recorded under, with per-connection counts and time
//! ranges.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

pub const INDEX_VERSION: u32 = 1;
pub const INDEX_FILENAME: &str = "bag.json";

/// One recorded stream: a topic and the message type written on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: u16,
    pub topic: String,
    pub msg_type: String,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub start_ns: Option<u64>,
    #[serde(default)]
    pub end_ns: Option<u64>,
}

impl Connection {
    pub fn new(id: u16, topic: impl Into<String>, msg_type: impl Into<String>) -> Self {
        Self {
            id,
            topic: topic.into(),
            msg_type: msg_type.into(),
            message_count: 0,
            start_ns: None,
            end_ns: None,
        }
    }

    pub(crate) fn record(&mut self, timestamp_ns: u64) {
        self.message_count += 1;
        self.start_ns = Some(self.start_ns.map_or(timestamp_ns, |cur| cur.min(timestamp_ns)));
        self.end_ns = Some(self.end_ns.map_or(timestamp_ns, |cur| cur.max(timestamp_ns)));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagIndex {
    pub version: u32,
    pub created_at_ns: u64,
    pub connections: Vec<Connection>,
}

impl BagIndex {
    pub fn new(created_at_ns: u64) -> Self {
        Self {
            version: INDEX_VERSION,
            created_at_ns,
            connections: Vec::new(),
        }
    }

    pub fn connection(&self, id: u16) -> Option<&Connection> {
        self.connections.iter().find(|conn| conn.id == id)
    }

    /// Connections recorded on `topic`.
    pub fn connections_on<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |conn| conn.topic == topic)
    }

    /// Distinct topics in first-recorded order.
    pub fn topics(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.connections
            .iter()
            .map(|conn| conn.topic.as_str())
            .filter(|topic| seen.insert(*topic))
            .collect()
    }

    pub fn message_count(&self) -> u64 {
        self.connections.iter().map(|conn| conn.message_count).sum()
    }

    /// Earliest and latest record timestamp across all connections.
    pub fn time_range(&self) -> Option<(u64, u64)> {
        let start = self.connections.iter().filter_map(|conn| conn.start_ns).min()?;
        let end = self.connections.iter().filter_map(|conn| conn.end_ns).max()?;
        Some((start, end))
    }

    /// Span of `time_range` in nanoseconds; zero if the range is inverted.
    pub fn duration_ns(&self) -> Option<u64> {
        self.time_range().map(|(start, end)| end.saturating_sub(start))
    }

    /// Write the index atomically (temp file, fsync, rename).
    pub fn save(&self, bag_root: &Path) -> Result<()> {
        let path = index_path(bag_root);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(self)
            .map_err(|err| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// Load and validate the index of the bag at `bag_root`.
    ///
    /// # Errors
    ///
    /// - `Error::Io`: index missing or unreadable
    /// - `Error::CorruptIndex`: invalid JSON or duplicate connection ids
    /// - `Error::UnsupportedVersion`: index written by another format version
    pub fn load(bag_root: &Path) -> Result<Self> {
        let path = index_path(bag_root);
        let json = fs::read_to_string(&path)?;
        let index: BagIndex = serde_json::from_str(&json)
            .map_err(|err| Error::CorruptIndex(format!("{}: {err}", path.display())))?;

        if index.version != INDEX_VERSION {
            return Err(Error::UnsupportedVersion(index.version));
        }

        let mut ids = HashSet::new();
        for conn in &index.connections {
            if !ids.insert(conn.id) {
                return Err(Error::CorruptIndex(format!("duplicate connection id {}", conn.id)));
            }
        }

        Ok(index)
    }

    pub fn exists(bag_root: &Path) -> bool {
        index_path(bag_root).exists()
    }
}

pub fn index_path(bag_root: &Path) -> PathBuf {
    bag_root.join(INDEX_FILENAME)
}
