//! Write side of a bag.
//!
//! # Example
//!
//! ```no_run
//! use hive::bag::BagWriter;
//! use hive::msg::{Axis, Header, LightSample, ViveLight, TOPIC_LIGHT};
//!
//! let mut writer = BagWriter::create("./session.bag")?;
//! let light = ViveLight {
//!     header: Header::new(1_000, "LHR-08DE963B"),
//!     lighthouse: "LHB-400B1A3E".to_string(),
//!     axis: Axis::Horizontal,
//!     samples: vec![LightSample::from_ticks(4, 201_250, 620)],
//! };
//! writer.write(TOPIC_LIGHT, light.header.stamp_ns, &light)?;
//! writer.finish()?;
//! # Ok::<(), hive::Error>(())
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::bag::index::{BagIndex, Connection};
use crate::core::chunk::{discover_chunks, validate_chunk_size, DEFAULT_CHUNK_SIZE};
use crate::core::chunk_writer::ChunkWriter;
use crate::core::{Clock, Error, Result, SystemClock};
use crate::msg::{Message, PayloadWriter};

/// Configuration for a new bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagConfig {
    /// Capacity of one chunk file in bytes. Sealed chunks are shrunk to
    /// what was written.
    /// Default: 128 MB
    pub chunk_size: usize,
}

impl Default for BagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Records typed messages into a new bag directory.
///
/// Each topic gets one connection on first write; the bag index is written
/// by `finish()` (or on drop).
pub struct BagWriter<K: Clock = SystemClock> {
    root: PathBuf,
    chunks: ChunkWriter,
    index: BagIndex,
    topics: HashMap<String, u16>,
    clock: K,
    scratch: Vec<u8>,
    finished: bool,
}

impl BagWriter<SystemClock> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with_config(path, BagConfig::default())
    }

    pub fn create_with_config(path: impl AsRef<Path>, config: BagConfig) -> Result<Self> {
        Self::create_with_clock(path, config, SystemClock)
    }
}

impl<K: Clock> BagWriter<K> {
    /// Create a bag stamped by `clock`.
    ///
    /// # Errors
    ///
    /// - `Error::AlreadyExists`: `path` already holds an index or chunks
    /// - `Error::Unsupported`: chunk size too small
    /// - `Error::Io`: failed to create the directory
    pub fn create_with_clock(path: impl AsRef<Path>, config: BagConfig, clock: K) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let chunk_size = validate_chunk_size(config.chunk_size as u64)?;

        if BagIndex::exists(&root) || !discover_chunks(&root)?.is_empty() {
            return Err(Error::AlreadyExists(root));
        }
        std::fs::create_dir_all(&root)?;

        let index = BagIndex::new(clock.now());
        debug!("recording bag {} (chunk size {chunk_size})", root.display());
        Ok(Self {
            chunks: ChunkWriter::new(&root, 0, chunk_size),
            root,
            index,
            topics: HashMap::new(),
            clock,
            scratch: Vec::new(),
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &BagIndex {
        &self.index
    }

    /// Records written so far.
    pub fn message_count(&self) -> u64 {
        self.chunks.seq()
    }

    /// Encode `msg` and append it on `topic`.
    ///
    /// # Errors
    ///
    /// - `Error::TypeMismatch`: `topic` was first written with another type
    /// - `Error::PayloadTooLarge`: the encoded message cannot fit a chunk
    /// - `Error::Closed`: the writer was finished
    pub fn write<M: Message>(&mut self, topic: &str, timestamp_ns: u64, msg: &M) -> Result<()> {
        let mut out = PayloadWriter::with_buffer(std::mem::take(&mut self.scratch));
        msg.encode(&mut out);
        let payload = out.into_inner();
        let result = self.append(topic, M::TYPE_NAME, timestamp_ns, &payload);
        self.scratch = payload;
        result
    }

    /// Like `write`, stamped with the writer's clock.
    pub fn write_now<M: Message>(&mut self, topic: &str, msg: &M) -> Result<()> {
        let timestamp_ns = self.clock.now();
        self.write(topic, timestamp_ns, msg)
    }

    /// Append already-encoded bytes under an explicit type name.
    pub fn write_raw(
        &mut self,
        topic: &str,
        msg_type: &str,
        timestamp_ns: u64,
        payload: &[u8],
    ) -> Result<()> {
        self.append(topic, msg_type, timestamp_ns, payload)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.chunks.flush()
    }

    /// Seal the last chunk and write the index. Idempotent.
    pub fn finish(&mut self) -> Result<&BagIndex> {
        if !self.finished {
            self.chunks.finish()?;
            self.index.save(&self.root)?;
            self.finished = true;
            debug!(
                "finished bag {} ({} records, {} chunks)",
                self.root.display(),
                self.chunks.seq(),
                self.chunks.chunks_published()
            );
        }
        Ok(&self.index)
    }

    /// Append a record, registering the topic's connection once the first
    /// record on it has been stored.
    fn append(&mut self, topic: &str, msg_type: &str, timestamp_ns: u64, payload: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::Closed);
        }
        let (conn_id, registered) = self.connection_for(topic, msg_type)?;
        self.chunks.append(conn_id, timestamp_ns, payload)?;

        if !registered {
            self.index.connections.push(Connection::new(conn_id, topic, msg_type));
            self.topics.insert(topic.to_string(), conn_id);
            debug!("connection {conn_id}: {topic} ({msg_type})");
        }
        // Connection ids are assigned as positions in the index.
        if let Some(conn) = self.index.connections.get_mut(usize::from(conn_id)) {
            conn.record(timestamp_ns);
        }
        Ok(())
    }

    /// Connection id for `topic`, and whether it is already in the index.
    fn connection_for(&self, topic: &str, msg_type: &str) -> Result<(u16, bool)> {
        if let Some(&id) = self.topics.get(topic) {
            let conn = self
                .index
                .connections
                .get(usize::from(id))
                .ok_or(Error::Corrupt("connection missing from index"))?;
            if conn.msg_type != msg_type {
                return Err(Error::TypeMismatch {
                    topic: topic.to_string(),
                    expected: conn.msg_type.clone(),
                    found: msg_type.to_string(),
                });
            }
            return Ok((id, true));
        }

        let id = u16::try_from(self.index.connections.len())
            .ok()
            .filter(|id| *id != u16::MAX)
            .ok_or(Error::Unsupported("too many connections"))?;
        Ok((id, false))
    }
}

impl<K: Clock> Drop for BagWriter<K> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.finish() {
                warn!("failed to finish bag {}: {err}", self.root.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::{Header, Imu, RawMessage, ViveLight, TOPIC_IMU, TOPIC_LIGHT};
    use tempfile::TempDir;

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now(&self) -> u64 {
            self.0
        }
    }

    fn imu(stamp_ns: u64) -> Imu {
        Imu::from_raw(Header::new(stamp_ns, "LHR-1"), [0, 0, 4096], [0, 0, 0])
    }

    #[test]
    fn test_index_tracks_connections() {
        let dir = TempDir::new().unwrap();
        let mut writer = BagWriter::create(dir.path()).unwrap();
        writer.write(TOPIC_IMU, 20, &imu(20)).unwrap();
        writer.write(TOPIC_IMU, 10, &imu(10)).unwrap();
        writer.write_raw("/debug", "raw/Bytes", 30, b"xyz").unwrap();
        assert_eq!(writer.message_count(), 3);

        let index = writer.finish().unwrap().clone();
        assert_eq!(index.connections.len(), 2);
        assert_eq!(index.connections[0].msg_type, Imu::TYPE_NAME);
        assert_eq!(index.connections[0].message_count, 2);
        assert_eq!(index.connections[0].start_ns, Some(10));
        assert_eq!(index.connections[0].end_ns, Some(20));
        assert_eq!(index.time_range(), Some((10, 30)));
        assert_eq!(BagIndex::load(dir.path()).unwrap(), index);
    }

    #[test]
    fn test_create_refuses_existing_bag() {
        let dir = TempDir::new().unwrap();
        BagWriter::create(dir.path()).unwrap().finish().unwrap();
        assert!(matches!(
            BagWriter::create(dir.path()).err(),
            Some(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_topic_type_is_fixed_by_first_write() {
        let dir = TempDir::new().unwrap();
        let mut writer = BagWriter::create(dir.path()).unwrap();
        writer.write(TOPIC_LIGHT, 1, &RawMessage(vec![1])).unwrap();
        let err = writer.write(TOPIC_LIGHT, 2, &imu(2)).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch { ref expected, .. } if expected == RawMessage::TYPE_NAME
        ));
        assert_eq!(writer.message_count(), 1);
        assert_ne!(RawMessage::TYPE_NAME, ViveLight::TYPE_NAME);
    }

    #[test]
    fn test_failed_first_write_leaves_no_connection() {
        let dir = TempDir::new().unwrap();
        let config = BagConfig { chunk_size: 4096 };
        let mut writer = BagWriter::create_with_config(dir.path(), config).unwrap();

        let err = writer
            .write(TOPIC_LIGHT, 1, &RawMessage(vec![0; 8192]))
            .unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge));
        assert!(writer.index().connections.is_empty());

        // The topic's type is still open.
        writer.write(TOPIC_LIGHT, 2, &imu(2)).unwrap();
        let index = writer.finish().unwrap();
        assert_eq!(index.connections.len(), 1);
        assert_eq!(index.connections[0].id, 0);
        assert_eq!(index.connections[0].msg_type, Imu::TYPE_NAME);
        assert_eq!(index.connections[0].message_count, 1);
    }

    #[test]
    fn test_write_now_uses_clock() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            BagWriter::create_with_clock(dir.path(), BagConfig::default(), FixedClock(777)).unwrap();
        writer.write_now(TOPIC_IMU, &imu(0)).unwrap();
        let index = writer.finish().unwrap();
        assert_eq!(index.created_at_ns, 777);
        assert_eq!(index.connections[0].start_ns, Some(777));
    }

    #[test]
    fn test_drop_finishes_bag() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = BagWriter::create(dir.path()).unwrap();
            writer.write(TOPIC_IMU, 1, &imu(1)).unwrap();
        }
        let index = BagIndex::load(dir.path()).unwrap();
        assert_eq!(index.message_count(), 1);
        assert_eq!(discover_chunks(dir.path()).unwrap(), vec![0]);
    }

    #[test]
    fn test_write_after_finish_fails() {
        let dir = TempDir::new().unwrap();
        let mut writer = BagWriter::create(dir.path()).unwrap();
        writer.finish().unwrap();
        assert!(matches!(writer.write(TOPIC_IMU, 1, &imu(1)), Err(Error::Closed)));
    }

    #[test]
    fn test_chunk_size_validated() {
        let dir = TempDir::new().unwrap();
        let err = BagWriter::create_with_config(dir.path(), BagConfig { chunk_size: 32 }).err();
        assert!(matches!(err, Some(Error::Unsupported(_))));
    }
}
