//! On-disk record header.
//!
//! Every record in a chunk starts with a fixed 32-byte little-endian header:
//!
//! ```text
//! 0      4          8       16             24        26      28      32
//! +------+----------+-------+--------------+---------+-------+-------+
//! |commit| checksum |  seq  | timestamp_ns | conn_id | flags | _pad  |
//! +------+----------+-------+--------------+---------+-------+-------+
//! ```
//!
//! `commit_len` is zero past the last written record, otherwise it is the
//! payload length plus one.

use crate::core::{Error, Result};

pub const HEADER_SIZE: usize = 32;
pub const RECORD_ALIGN: usize = 8;
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize - 1;

pub const COMMIT_LEN_OFFSET: usize = 0;
pub const CHECKSUM_OFFSET: usize = 4;
pub const SEQ_OFFSET: usize = 8;
pub const TIMESTAMP_OFFSET: usize = 16;
pub const CONN_ID_OFFSET: usize = 24;
pub const FLAGS_OFFSET: usize = 26;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub commit_len: u32,
    pub checksum: u32,
    pub seq: u64,
    pub timestamp_ns: u64,
    pub conn_id: u16,
    pub flags: u16,
}

/// Aligns a value up to the nearest multiple of `align`.
#[inline]
pub fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Total on-disk length of a record carrying `payload_len` bytes.
#[inline]
pub fn record_len(payload_len: usize) -> usize {
    align_up(HEADER_SIZE + payload_len, RECORD_ALIGN)
}

impl RecordHeader {
    pub fn new(seq: u64, timestamp_ns: u64, conn_id: u16, payload: &[u8]) -> Result<Self> {
        Ok(Self {
            commit_len: Self::commit_len_for_payload(payload.len())?,
            checksum: Self::crc32(payload),
            seq,
            timestamp_ns,
            conn_id,
            flags: 0,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[COMMIT_LEN_OFFSET..COMMIT_LEN_OFFSET + 4].copy_from_slice(&self.commit_len.to_le_bytes());
        buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&self.checksum.to_le_bytes());
        buf[SEQ_OFFSET..SEQ_OFFSET + 8].copy_from_slice(&self.seq.to_le_bytes());
        buf[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8].copy_from_slice(&self.timestamp_ns.to_le_bytes());
        buf[CONN_ID_OFFSET..CONN_ID_OFFSET + 2].copy_from_slice(&self.conn_id.to_le_bytes());
        buf[FLAGS_OFFSET..FLAGS_OFFSET + 2].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::Corrupt("record header truncated"));
        }
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let u64_at = |at: usize| (u64::from(u32_at(at + 4)) << 32) | u64::from(u32_at(at));
        Ok(Self {
            commit_len: u32_at(COMMIT_LEN_OFFSET),
            checksum: u32_at(CHECKSUM_OFFSET),
            seq: u64_at(SEQ_OFFSET),
            timestamp_ns: u64_at(TIMESTAMP_OFFSET),
            conn_id: u16_at(CONN_ID_OFFSET),
            flags: u16_at(FLAGS_OFFSET),
        })
    }

    /// Reads only the commit word at the start of `bytes`.
    pub fn peek_commit_len(bytes: &[u8]) -> Option<u32> {
        let word = bytes.get(COMMIT_LEN_OFFSET..COMMIT_LEN_OFFSET + 4)?;
        Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
    }

    pub fn commit_len_for_payload(payload_len: usize) -> Result<u32> {
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge);
        }
        Ok((payload_len as u32) + 1)
    }

    pub fn payload_len(&self) -> Result<usize> {
        if self.commit_len == 0 {
            return Err(Error::Corrupt("commit length is zero"));
        }
        Ok((self.commit_len - 1) as usize)
    }

    pub fn crc32(payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(payload);
        hasher.finalize()
    }

    pub fn validate_crc(&self, payload: &[u8]) -> Result<()> {
        if Self::crc32(payload) == self.checksum {
            Ok(())
        } else {
            Err(Error::Corrupt("checksum mismatch"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_matches_known_payload() {
        let crc = RecordHeader::crc32(b"hello");
        assert_eq!(crc, 0x3610A686);
    }

    #[test]
    fn header_round_trip_preserves_fields() {
        let header = RecordHeader {
            commit_len: 42,
            checksum: 0xAABB_CCDD,
            seq: 0x1122_3344_5566_7788,
            timestamp_ns: 0x99AA_BBCC_DDEE_FF00,
            conn_id: 0x1357,
            flags: 0x2468,
        };
        let bytes = header.to_bytes();
        assert_eq!(RecordHeader::from_bytes(&bytes).unwrap(), header);
        assert_eq!(RecordHeader::peek_commit_len(&bytes), Some(42));
    }

    #[test]
    fn record_len_is_aligned() {
        assert_eq!(record_len(0), 32);
        assert_eq!(record_len(1), 40);
        assert_eq!(record_len(8), 40);
        assert_eq!(record_len(9), 48);
    }

    #[test]
    fn zero_commit_is_not_a_payload_length() {
        let header = RecordHeader::from_bytes(&[0u8; HEADER_SIZE]).unwrap();
        assert!(matches!(header.payload_len(), Err(Error::Corrupt(_))));
    }

    #[test]
    fn checksum_mismatch_is_corrupt() {
        let header = RecordHeader::new(0, 10, 1, b"light").unwrap();
        header.validate_crc(b"light").unwrap();
        assert!(matches!(header.validate_crc(b"lighT"), Err(Error::Corrupt(_))));
    }
}
