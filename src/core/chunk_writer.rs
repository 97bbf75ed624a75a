//! Chunk writing primitive.
//!
//! Appends records to one active chunk at a time, rolling to the next chunk
//! id when the current one is full. Knows nothing about topics or
//! connections; those live in the bag layer.

use std::path::PathBuf;

use log::debug;

use crate::core::chunk::{chunk_path, chunk_temp_path, prepare_chunk_temp, publish_chunk, seal_chunk, CHUNK_DATA_OFFSET};
use crate::core::header::{record_len, RecordHeader, HEADER_SIZE, MAX_PAYLOAD_LEN};
use crate::core::mmap::ChunkMapMut;
use crate::core::{Error, Result};

/// Sequential writer over numbered chunk files.
///
/// ```text
/// 1. new()
/// 2. append() records; a full chunk is sealed and published automatically
/// 3. finish() seals and publishes the last chunk
/// ```
pub struct ChunkWriter {
    dir: PathBuf,
    chunk_id: u64,
    chunk_size: usize,
    write_offset: usize,
    seq: u64,
    mmap: Option<ChunkMapMut>,
    chunks_published: u64,
    has_records: bool,
}

impl ChunkWriter {
    /// The first chunk file is created lazily on the first append.
    pub fn new(dir: impl Into<PathBuf>, chunk_id: u64, chunk_size: usize) -> Self {
        Self {
            dir: dir.into(),
            chunk_id,
            chunk_size,
            write_offset: CHUNK_DATA_OFFSET,
            seq: 0,
            mmap: None,
            chunks_published: 0,
            has_records: false,
        }
    }

    pub fn chunk_id(&self) -> u64 {
        self.chunk_id
    }

    /// Number of records appended so far.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn chunks_published(&self) -> u64 {
        self.chunks_published
    }

    pub fn has_records(&self) -> bool {
        self.has_records
    }

    pub fn needs_roll(&self, record_len: usize) -> bool {
        self.write_offset + record_len > self.chunk_size
    }

    /// Append one record, rolling first if it does not fit the current chunk.
    ///
    /// # Errors
    ///
    /// - `Error::PayloadTooLarge`: the record cannot fit even an empty chunk
    /// - `Error::Io`: failed to create, seal or publish a chunk
    pub fn append(&mut self, conn_id: u16, timestamp_ns: u64, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge);
        }
        let len = record_len(payload.len());
        if len > self.chunk_size.saturating_sub(CHUNK_DATA_OFFSET) {
            return Err(Error::PayloadTooLarge);
        }

        if self.needs_roll(len) {
            self.roll()?;
        }
        self.ensure_chunk()?;

        let offset = self.write_offset;
        let header = RecordHeader::new(self.seq, timestamp_ns, conn_id, payload)?;
        let mmap = self
            .mmap
            .as_mut()
            .ok_or(Error::Corrupt("chunk mmap missing"))?;

        if !payload.is_empty() {
            mmap.range_mut(offset + HEADER_SIZE, payload.len())?
                .copy_from_slice(payload);
        }
        // The commit word goes last so a torn write reads as end-of-data.
        let bytes = header.to_bytes();
        mmap.range_mut(offset + 4, HEADER_SIZE - 4)?
            .copy_from_slice(&bytes[4..]);
        mmap.range_mut(offset, 4)?.copy_from_slice(&bytes[..4]);

        self.seq = self.seq.wrapping_add(1);
        self.write_offset += len;
        self.has_records = true;
        Ok(())
    }

    /// Seal and publish the current chunk (if it has records) and move to
    /// the next chunk id.
    pub fn roll(&mut self) -> Result<()> {
        if self.has_records {
            self.seal_and_publish_current()?;
        } else {
            self.discard_current();
        }

        self.chunk_id += 1;
        self.write_offset = CHUNK_DATA_OFFSET;
        self.has_records = false;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush_async()?;
        }
        Ok(())
    }

    /// Seal and publish the last chunk. Empty chunks are discarded.
    pub fn finish(&mut self) -> Result<()> {
        if !self.has_records {
            self.discard_current();
            return Ok(());
        }
        self.roll()
    }

    fn seal_and_publish_current(&mut self) -> Result<()> {
        let Some(mut mmap) = self.mmap.take() else {
            return Ok(());
        };
        seal_chunk(&mut mmap)?;
        mmap.flush_sync()?;
        // Shrink to the written length; the file handle closes here.
        mmap.truncate(self.write_offset)?;

        let temp_path = chunk_temp_path(&self.dir, self.chunk_id);
        let final_path = chunk_path(&self.dir, self.chunk_id);
        publish_chunk(&temp_path, &final_path)?;

        self.chunks_published += 1;
        debug!(
            "published chunk {} ({} bytes) in {}",
            self.chunk_id,
            self.write_offset,
            self.dir.display()
        );
        Ok(())
    }

    fn discard_current(&mut self) {
        if let Some(mmap) = self.mmap.take() {
            drop(mmap);
            let _ = std::fs::remove_file(chunk_temp_path(&self.dir, self.chunk_id));
        }
    }

    fn ensure_chunk(&mut self) -> Result<()> {
        if self.mmap.is_some() {
            return Ok(());
        }
        let mmap = prepare_chunk_temp(&self.dir, self.chunk_id, self.chunk_size)?;
        self.write_offset = CHUNK_DATA_OFFSET;
        self.has_records = false;
        self.mmap = Some(mmap);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chunk::discover_chunks;
    use tempfile::TempDir;

    #[test]
    fn test_chunk_writer_basic() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), 0, 1024 * 1024);

        writer.append(0, 1000, b"hello").unwrap();
        assert_eq!(writer.seq(), 1);
        assert!(writer.has_records());

        writer.finish().unwrap();
        assert_eq!(writer.chunks_published(), 1);
        assert_eq!(discover_chunks(dir.path()).unwrap(), vec![0]);

        // Published chunk is shrunk to header + one aligned record.
        let len = std::fs::metadata(chunk_path(dir.path(), 0)).unwrap().len();
        assert_eq!(len as usize, CHUNK_DATA_OFFSET + record_len(5));
    }

    #[test]
    fn test_chunk_writer_empty_finish() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), 0, 1024 * 1024);

        writer.finish().unwrap();
        assert_eq!(writer.chunks_published(), 0);
        assert!(discover_chunks(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_writer_rolls_when_full() {
        let dir = TempDir::new().unwrap();
        let chunk_size = 4096;
        let mut writer = ChunkWriter::new(dir.path(), 0, chunk_size);

        let payload = vec![7u8; 1000];
        for i in 0..10 {
            writer.append(1, i, &payload).unwrap();
        }
        writer.finish().unwrap();

        // Four 1032-byte records do not fit after the 64-byte header.
        let chunks = discover_chunks(dir.path()).unwrap();
        assert_eq!(chunks, vec![0, 1, 2, 3]);
        assert_eq!(writer.chunks_published(), 4);
        assert_eq!(writer.seq(), 10);
    }

    #[test]
    fn test_chunk_writer_finish_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), 0, 4096);
        writer.append(1, 1, b"x").unwrap();
        writer.finish().unwrap();
        writer.finish().unwrap();
        assert_eq!(writer.chunks_published(), 1);
    }

    #[test]
    fn test_chunk_writer_payload_too_large() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), 0, 4096);

        let err = writer.append(1, 1000, &vec![0u8; 4096]).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge));
        assert!(discover_chunks(dir.path()).unwrap().is_empty());
    }
}
