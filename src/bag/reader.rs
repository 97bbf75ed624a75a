//! Read side of a bag.
//!
//! `BagReader::open` validates the index and every published chunk up front
//! and keeps the chunk files open until the reader is released or dropped.
//! Reads map one chunk at a time and walk its records in file order; chunks
//! are visited in id order, so records come back exactly as recorded.
//!
//! # Example
//!
//! ```no_run
//! use hive::bag::{BagReader, HandlerError};
//! use hive::msg::{ViveLight, TOPIC_LIGHT};
//!
//! let reader = BagReader::open("./session.bag")?;
//! let mut stamps = Vec::new();
//! reader.read(
//!     TOPIC_LIGHT,
//!     &mut |light: ViveLight, stamps: &mut Vec<u64>| -> Result<(), HandlerError> {
//!         stamps.push(light.header.stamp_ns);
//!         Ok(())
//!     },
//!     &mut stamps,
//! )?;
//! # Ok::<(), hive::Error>(())
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use log::debug;

use crate::bag::filter::TopicFilter;
use crate::bag::handler::Handler;
use crate::bag::index::{BagIndex, Connection};
use crate::core::chunk::{chunk_path, discover_chunks, read_chunk_header, CHUNK_DATA_OFFSET};
use crate::core::header::{record_len, RecordHeader, HEADER_SIZE};
use crate::core::mmap::ChunkMap;
use crate::core::{Error, Result};
use crate::msg::Message;

struct ChunkFile {
    id: u64,
    file: File,
}

/// Everything held while a reader is open.
struct OpenBag {
    index: BagIndex,
    chunks: Vec<ChunkFile>,
}

impl OpenBag {
    fn load(root: &Path) -> Result<Self> {
        if !std::fs::metadata(root)?.is_dir() {
            return Err(Error::Unsupported("bag path is not a directory"));
        }

        let index = BagIndex::load(root)?;

        let ids = discover_chunks(root)?;
        // Chunks are published 0, 1, 2, ...; a missing id means lost records.
        if ids.iter().zip(0u64..).any(|(&id, expected)| id != expected) {
            return Err(Error::Corrupt("chunk sequence has a gap"));
        }
        if ids.is_empty() && index.message_count() > 0 {
            return Err(Error::Corrupt("index lists records but bag has no chunks"));
        }

        let mut chunks = Vec::with_capacity(ids.len());
        for id in ids {
            let mut file = File::open(chunk_path(root, id))?;
            let header = read_chunk_header(&mut file)?;
            if u64::from(header.chunk_id) != id {
                return Err(Error::Corrupt("chunk id mismatch"));
            }
            if !header.is_sealed() {
                return Err(Error::Corrupt("chunk is not sealed"));
            }
            chunks.push(ChunkFile { id, file });
        }

        Ok(Self { index, chunks })
    }
}

/// Read-only handle on a recorded bag.
pub struct BagReader {
    path: PathBuf,
    bag: Option<OpenBag>,
}

impl BagReader {
    /// Open the bag at `path`.
    ///
    /// # Errors
    ///
    /// `Error::Open` wrapping the cause: `Io` (missing path or index),
    /// `Unsupported` (not a directory), `CorruptIndex`, `UnsupportedVersion`
    /// or `Corrupt` (bad chunk header, unsealed or missing chunk). Nothing
    /// stays open on failure.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bag = OpenBag::load(&path).map_err(|err| Error::open(&path, err))?;
        debug!(
            "opened bag {} ({} connections, {} chunks)",
            path.display(),
            bag.index.connections.len(),
            bag.chunks.len()
        );
        Ok(Self {
            path,
            bag: Some(bag),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.bag.is_some()
    }

    /// Close every chunk file. Calling this on a released reader does nothing.
    pub fn release(&mut self) {
        if let Some(bag) = self.bag.take() {
            debug!("released bag {} ({} chunks)", self.path.display(), bag.chunks.len());
        }
    }

    fn open_bag(&self) -> Result<&OpenBag> {
        self.bag.as_ref().ok_or(Error::Closed)
    }

    pub fn index(&self) -> Result<&BagIndex> {
        Ok(&self.open_bag()?.index)
    }

    pub fn connections(&self) -> Result<&[Connection]> {
        Ok(&self.open_bag()?.index.connections)
    }

    pub fn topics(&self) -> Result<Vec<&str>> {
        Ok(self.open_bag()?.index.topics())
    }

    /// Number of records on `topic` according to the index.
    pub fn message_count(&self, topic: &str) -> Result<u64> {
        Ok(self
            .open_bag()?
            .index
            .connections_on(topic)
            .map(|conn| conn.message_count)
            .sum())
    }

    pub fn chunk_ids(&self) -> Result<Vec<u64>> {
        Ok(self.open_bag()?.chunks.iter().map(|chunk| chunk.id).collect())
    }

    /// Start a scan from the first record of the bag.
    pub fn cursor(&self, filter: impl Into<TopicFilter>) -> Result<BagCursor<'_>> {
        let bag = self.open_bag()?;
        Ok(BagCursor::new(bag, &filter.into()))
    }

    /// Decode every record on `topic` as `M` and hand it to `handler`, in
    /// recorded order.
    ///
    /// Each call rescans the bag from the start. A topic with no records
    /// returns `Ok(())` without calling the handler.
    ///
    /// # Errors
    ///
    /// - `Error::Closed`: the reader was released
    /// - `Error::TypeMismatch`: a connection on `topic` holds another type;
    ///   raised before any record is delivered
    /// - `Error::Handler`: the handler failed; no further records are delivered
    /// - `Error::Decode` / `Error::Corrupt`: a record could not be read
    pub fn read<M, C, H>(&self, topic: &str, handler: &mut H, ctx: &mut C) -> Result<()>
    where
        M: Message,
        C: ?Sized,
        H: Handler<M, C> + ?Sized,
    {
        let bag = self.open_bag()?;
        if let Some(conn) = bag.index.connections_on(topic).find(|conn| !M::accepts(&conn.msg_type)) {
            return Err(Error::TypeMismatch {
                topic: topic.to_string(),
                expected: M::TYPE_NAME.to_string(),
                found: conn.msg_type.clone(),
            });
        }

        let mut cursor = BagCursor::new(bag, &TopicFilter::topic(topic));
        let mut delivered = 0u64;
        while let Some(record) = cursor.next()? {
            let msg = M::decode(record.payload)?;
            handler.handle(msg, ctx).map_err(Error::Handler)?;
            delivered += 1;
        }

        debug!("delivered {delivered} records on {topic} from {}", self.path.display());
        Ok(())
    }
}

impl Drop for BagReader {
    fn drop(&mut self) {
        self.release();
    }
}

/// One stored record, borrowed from the mapped chunk.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    pub seq: u64,
    pub timestamp_ns: u64,
    pub connection: &'a Connection,
    pub payload: &'a [u8],
}

impl<'a> RecordView<'a> {
    pub fn topic(&self) -> &'a str {
        &self.connection.topic
    }

    pub fn msg_type(&self) -> &'a str {
        &self.connection.msg_type
    }

    /// Decode the payload as `M` if the connection type allows it.
    pub fn decode<M: Message>(&self) -> Result<M> {
        if !M::accepts(self.msg_type()) {
            return Err(Error::TypeMismatch {
                topic: self.topic().to_string(),
                expected: M::TYPE_NAME.to_string(),
                found: self.msg_type().to_string(),
            });
        }
        M::decode(self.payload)
    }
}

struct Located<'a> {
    seq: u64,
    timestamp_ns: u64,
    connection: &'a Connection,
    payload_offset: usize,
    payload_len: usize,
}

enum Step<'a> {
    Record(Located<'a>),
    Skip,
    EndOfChunk,
}

/// Lazy, single-pass scan over the records matching a topic filter.
pub struct BagCursor<'a> {
    bag: &'a OpenBag,
    /// Every known connection, flagged with whether the filter wants it.
    conns: HashMap<u16, (&'a Connection, bool)>,
    chunk_idx: usize,
    map: Option<ChunkMap>,
    offset: usize,
}

impl<'a> BagCursor<'a> {
    fn new(bag: &'a OpenBag, filter: &TopicFilter) -> Self {
        let conns: HashMap<_, _> = bag
            .index
            .connections
            .iter()
            .map(|conn| (conn.id, (conn, filter.matches(&conn.topic))))
            .collect();
        let any_wanted = conns.values().any(|(_, wanted)| *wanted);

        Self {
            bag,
            conns,
            // Nothing can match: start past the last chunk.
            chunk_idx: if any_wanted { 0 } else { bag.chunks.len() },
            map: None,
            offset: CHUNK_DATA_OFFSET,
        }
    }

    /// Next matching record, or `None` once every chunk has been scanned.
    pub fn next(&mut self) -> Result<Option<RecordView<'_>>> {
        let found = loop {
            if self.map.is_none() {
                let Some(chunk) = self.bag.chunks.get(self.chunk_idx) else {
                    return Ok(None);
                };
                self.map = Some(ChunkMap::map(&chunk.file)?);
                self.offset = CHUNK_DATA_OFFSET;
                debug!("mapped chunk {}", chunk.id);
            }

            match self.step()? {
                Step::Record(found) => break found,
                Step::Skip => {}
                Step::EndOfChunk => {
                    self.map = None;
                    self.chunk_idx += 1;
                }
            }
        };

        let map = self.map.as_ref().ok_or(Error::Corrupt("chunk mmap missing"))?;
        Ok(Some(RecordView {
            seq: found.seq,
            timestamp_ns: found.timestamp_ns,
            connection: found.connection,
            payload: map.range(found.payload_offset, found.payload_len)?,
        }))
    }

    fn step(&mut self) -> Result<Step<'a>> {
        let Some(map) = self.map.as_ref() else {
            return Ok(Step::EndOfChunk);
        };
        let bytes = map.as_slice();
        let start = self.offset;

        if start + HEADER_SIZE > bytes.len() {
            // Sealed chunks end exactly after their last record.
            if bytes[start.min(bytes.len())..].iter().any(|&b| b != 0) {
                return Err(Error::Corrupt("record header truncated"));
            }
            return Ok(Step::EndOfChunk);
        }
        if RecordHeader::peek_commit_len(&bytes[start..]).unwrap_or(0) == 0 {
            return Ok(Step::EndOfChunk);
        }

        let header = RecordHeader::from_bytes(&bytes[start..start + HEADER_SIZE])?;
        let payload_len = header.payload_len()?;
        let end = start
            .checked_add(record_len(payload_len))
            .ok_or(Error::Corrupt("record length overflow"))?;
        if end > bytes.len() {
            return Err(Error::Corrupt("record extends past end of chunk"));
        }

        let &(connection, wanted) = self
            .conns
            .get(&header.conn_id)
            .ok_or(Error::Corrupt("record references unknown connection"))?;
        self.offset = end;
        if !wanted {
            return Ok(Step::Skip);
        }

        let payload_offset = start + HEADER_SIZE;
        header.validate_crc(&bytes[payload_offset..payload_offset + payload_len])?;

        Ok(Step::Record(Located {
            seq: header.seq,
            timestamp_ns: header.timestamp_ns,
            connection,
            payload_offset,
            payload_len,
        }))
    }
}
