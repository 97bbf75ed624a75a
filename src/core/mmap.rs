//! Memory mappings over chunk files.
//!
//! Writers map a fresh temp file at full capacity and shrink it when the
//! chunk is sealed; readers map a sealed chunk read-only for as long as the
//! cursor sits on it.

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::core::{Error, Result};

fn bounds(offset: usize, len: usize, limit: usize) -> Result<std::ops::Range<usize>> {
    match offset.checked_add(len) {
        Some(end) if end <= limit => Ok(offset..end),
        Some(_) => Err(Error::Corrupt("range past end of chunk")),
        None => Err(Error::Corrupt("range overflow")),
    }
}

/// Writable mapping of a chunk being recorded.
pub struct ChunkMapMut {
    file: File,
    map: MmapMut,
}

impl ChunkMapMut {
    /// Create (or truncate) `path`, size it to `capacity` and map it.
    pub fn create(path: &Path, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Unsupported("chunk capacity must be non-zero"));
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.set_len(capacity as u64)?;
        // The temp file is private to this writer until it is published.
        let map = unsafe { MmapOptions::new().len(capacity).map_mut(&file)? };
        Ok(Self { file, map })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    pub fn range_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let range = bounds(offset, len, self.map.len())?;
        Ok(&mut self.map[range])
    }

    pub fn capacity(&self) -> usize {
        self.map.len()
    }

    /// Unmap, then cut the file down to the `written` bytes and fsync it.
    pub fn truncate(self, written: usize) -> Result<()> {
        let Self { file, map } = self;
        map.flush()?;
        drop(map);
        file.set_len(written as u64)?;
        file.sync_all()?;
        Ok(())
    }

    pub fn flush_async(&self) -> Result<()> {
        Ok(self.map.flush_async()?)
    }

    pub fn flush_sync(&self) -> Result<()> {
        Ok(self.map.flush()?)
    }
}

/// Read-only mapping of a sealed chunk.
pub struct ChunkMap {
    map: Mmap,
}

impl ChunkMap {
    pub fn map(file: &File) -> Result<Self> {
        let len = usize::try_from(file.metadata()?.len())
            .map_err(|_| Error::Unsupported("chunk too large to map"))?;
        if len == 0 {
            return Err(Error::Corrupt("chunk file is empty"));
        }
        // Sealed chunks are never written again.
        let map = unsafe { MmapOptions::new().len(len).map(file)? };
        Ok(Self { map })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    pub fn range(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let range = bounds(offset, len, self.map.len())?;
        Ok(&self.map[range])
    }
}
