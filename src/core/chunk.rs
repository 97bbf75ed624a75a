//! Chunk file lifecycle.
//!
//! Stateless helpers for naming, discovering, creating, sealing and
//! publishing the chunk files that hold a bag's records.
//!
//! A chunk is written as `{id}.chunk.tmp`, sealed, shrunk to its written
//! length, then renamed to `{id}.chunk`. Readers only ever see published
//! chunks.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::core::mmap::ChunkMapMut;
use crate::core::{Error, Result};

/// Default chunk capacity (128 MB).
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024 * 1024;

pub const CHUNK_HEADER_SIZE: usize = 64;

/// Offset where records begin.
pub const CHUNK_DATA_OFFSET: usize = 64;

/// Chunk magic number ('BAG0')
pub const CHUNK_MAGIC: u32 = 0x4241_4730;

pub const CHUNK_VERSION: u32 = 1;

/// Set once the writer is done with a chunk.
pub const CHUNK_FLAG_SEALED: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub magic: u32,
    pub version: u32,
    pub chunk_id: u32,
    pub flags: u32,
}

impl ChunkHeader {
    pub fn is_sealed(&self) -> bool {
        self.flags & CHUNK_FLAG_SEALED != 0
    }
}

// ============================================================================
// Naming
// ============================================================================

/// Chunk filename for an id (e.g., "000000042.chunk").
pub fn chunk_filename(id: u64) -> String {
    format!("{:09}.chunk", id)
}

pub fn chunk_temp_filename(id: u64) -> String {
    format!("{:09}.chunk.tmp", id)
}

pub fn chunk_path(root: &Path, id: u64) -> PathBuf {
    root.join(chunk_filename(id))
}

pub fn chunk_temp_path(root: &Path, id: u64) -> PathBuf {
    root.join(chunk_temp_filename(id))
}

/// Returns the chunk id of a published chunk filename.
pub fn parse_chunk_filename(name: &str) -> Option<u64> {
    let base = name.strip_suffix(".chunk")?;
    if base.len() != 9 || !base.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    base.parse::<u64>().ok()
}

// ============================================================================
// Discovery
// ============================================================================

/// Discover all published chunk ids in a directory, sorted ascending.
pub fn discover_chunks(dir: &Path) -> Result<Vec<u64>> {
    let mut chunks = Vec::new();

    if !dir.exists() {
        return Ok(chunks);
    }

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if let Some(id) = parse_chunk_filename(file_name) {
            chunks.push(id);
        }
    }

    chunks.sort_unstable();
    Ok(chunks)
}

// ============================================================================
// Creation & publishing
// ============================================================================

/// Validate a chunk capacity.
///
/// # Errors
///
/// - `Error::Unsupported`: size too small to hold a header and one record
pub fn validate_chunk_size(chunk_size: u64) -> Result<usize> {
    let size = usize::try_from(chunk_size)
        .map_err(|_| Error::Unsupported("chunk size exceeds addressable range"))?;

    let min_size = CHUNK_DATA_OFFSET + 64;
    if size < min_size {
        return Err(Error::Unsupported("chunk size too small"));
    }

    Ok(size)
}

/// Create `{id}.chunk.tmp` with a fresh header, replacing any stale temp file.
pub fn prepare_chunk_temp(root: &Path, id: u64, chunk_size: usize) -> Result<ChunkMapMut> {
    let temp_path = chunk_temp_path(root, id);
    let _ = std::fs::remove_file(&temp_path);

    let mut mmap = ChunkMapMut::create(&temp_path, chunk_size)?;
    let header = ChunkHeader {
        magic: CHUNK_MAGIC,
        version: CHUNK_VERSION,
        chunk_id: chunk_id_u32(id)?,
        flags: 0,
    };
    mmap.range_mut(0, CHUNK_HEADER_SIZE)?
        .copy_from_slice(&encode_chunk_header(&header));
    Ok(mmap)
}

/// Atomically rename a temp chunk to its final name without replacing an
/// existing chunk.
///
/// # Errors
///
/// - `Error::Io(AlreadyExists)`: final path already exists
pub fn publish_chunk(temp_path: &Path, final_path: &Path) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let temp_c = CString::new(temp_path.as_os_str().as_bytes())
            .map_err(|_| Error::Unsupported("chunk temp path contains null byte"))?;
        let final_c = CString::new(final_path.as_os_str().as_bytes())
            .map_err(|_| Error::Unsupported("chunk path contains null byte"))?;

        let rc = unsafe {
            libc::renameat2(
                libc::AT_FDCWD,
                temp_c.as_ptr(),
                libc::AT_FDCWD,
                final_c.as_ptr(),
                libc::RENAME_NOREPLACE,
            )
        };

        if rc == 0 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ENOSYS) && err.raw_os_error() != Some(libc::EINVAL) {
            return Err(Error::Io(err));
        }
    }

    if final_path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "chunk already exists",
        )));
    }

    std::fs::rename(temp_path, final_path)?;
    Ok(())
}

// ============================================================================
// Header management
// ============================================================================

pub fn encode_chunk_header(header: &ChunkHeader) -> [u8; CHUNK_HEADER_SIZE] {
    let mut buf = [0u8; CHUNK_HEADER_SIZE];
    buf[0..4].copy_from_slice(&header.magic.to_le_bytes());
    buf[4..8].copy_from_slice(&header.version.to_le_bytes());
    buf[8..12].copy_from_slice(&header.chunk_id.to_le_bytes());
    buf[12..16].copy_from_slice(&header.flags.to_le_bytes());
    buf
}

/// Decode and validate a chunk header (magic and version).
pub fn decode_chunk_header(bytes: &[u8]) -> Result<ChunkHeader> {
    if bytes.len() < CHUNK_HEADER_SIZE {
        return Err(Error::Corrupt("chunk too small for header"));
    }
    let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let header = ChunkHeader {
        magic: word(0),
        version: word(4),
        chunk_id: word(8),
        flags: word(12),
    };

    if header.magic != CHUNK_MAGIC {
        return Err(Error::Corrupt("chunk magic mismatch"));
    }
    if header.version != CHUNK_VERSION {
        return Err(Error::UnsupportedVersion(header.version));
    }
    Ok(header)
}

/// Read the header of an opened chunk file without mapping it.
pub fn read_chunk_header(file: &mut File) -> Result<ChunkHeader> {
    let mut buf = [0u8; CHUNK_HEADER_SIZE];
    file.read_exact(&mut buf).map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::Corrupt("chunk too small for header"),
        _ => Error::Io(err),
    })?;
    decode_chunk_header(&buf)
}

/// Set the SEALED flag. Idempotent.
pub fn seal_chunk(mmap: &mut ChunkMapMut) -> Result<()> {
    let mut header = decode_chunk_header(mmap.as_slice())?;
    if header.is_sealed() {
        return Ok(());
    }
    header.flags |= CHUNK_FLAG_SEALED;
    mmap.range_mut(0, CHUNK_HEADER_SIZE)?
        .copy_from_slice(&encode_chunk_header(&header));
    Ok(())
}

fn chunk_id_u32(id: u64) -> Result<u32> {
    u32::try_from(id).map_err(|_| Error::Unsupported("chunk id exceeds header range"))
}
