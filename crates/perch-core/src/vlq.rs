//! Variable-length quantity primitives shared by the register parser and
//! the transaction id hash.
//!
//! Unsigned values use base-128 VLQ (7 payload bits per byte, high bit as
//! continuation). Signed values are zigzag-mapped first, matching the
//! ledger's compact serialization format.

/// Reader failure: ran off the end of the buffer or the encoding was
/// longer than a u64 allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlqError;

/// A cursor over a byte slice with VLQ-aware reads.
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, VlqError> {
        let b = *self.bytes.get(self.pos).ok_or(VlqError)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], VlqError> {
        let end = self.pos.checked_add(n).ok_or(VlqError)?;
        let slice = self.bytes.get(self.pos..end).ok_or(VlqError)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u64(&mut self) -> Result<u64, VlqError> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.read_u8()?;
            // 10 bytes of 7 bits cover a u64; anything longer is malformed.
            if shift >= 64 {
                return Err(VlqError);
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub fn read_i64(&mut self) -> Result<i64, VlqError> {
        self.read_u64().map(zigzag_decode)
    }
}

/// A byte sink with VLQ-aware writes, used to build the canonical
/// transaction content encoding.
#[derive(Default)]
pub struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn put_u64(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.bytes.push(byte);
                return;
            }
            self.bytes.push(byte | 0x80);
        }
    }

    pub fn put_i64(&mut self, value: i64) {
        self.put_u64(zigzag_encode(value));
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
