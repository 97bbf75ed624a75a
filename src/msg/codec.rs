use crate::core::{Error, Result};

/// Append-only little-endian payload builder.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing allocation; the buffer is cleared first.
    pub fn with_buffer(mut buf: Vec<u8>) -> Self {
        buf.clear();
        Self { buf }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_len(&mut self, len: usize) {
        // Payloads are capped well below u32::MAX by the record header.
        self.put_u32(len as u32);
    }

    pub fn put_str(&mut self, value: &str) {
        self.put_len(value.len());
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn put_bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over an encoded payload.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(Error::Decode("length overflow"))?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(Error::Decode("payload truncated"))?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.array().map(u16::from_le_bytes)
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.array().map(u32::from_le_bytes)
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.array().map(u64::from_le_bytes)
    }

    pub fn f64(&mut self) -> Result<f64> {
        self.array().map(f64::from_le_bytes)
    }

    /// Reads a sequence length, rejecting counts the remaining bytes cannot
    /// hold at `min_item_len` bytes per item.
    pub fn len(&mut self, min_item_len: usize) -> Result<usize> {
        let len = self.u32()? as usize;
        if len.saturating_mul(min_item_len.max(1)) > self.remaining() {
            return Err(Error::Decode("sequence length exceeds payload"));
        }
        Ok(len)
    }

    pub fn string(&mut self) -> Result<String> {
        let len = self.len(1)?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::Decode("string is not utf-8"))
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Fails if any bytes are left unread.
    pub fn finish(self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(Error::Decode("trailing bytes after payload"));
        }
        Ok(())
    }
}
