use anyhow::{ensure, Result};

use std::io::Read;

/// Thin binary-cursor helpers layered over any [`Read`], mirroring the
/// `BinaryReader` used by the original snapshot parser: plain little-endian
/// fixed-width reads plus the variable-length integer encoding used
/// throughout the heap deserializer.
pub trait JscRead: Read {
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64_le(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Variable-length integer: a 2-bit length prefix packed into the first
    /// byte's top bits (`0b00` = 1 byte, `0b01` = 2 bytes, `0b10` = 3 bytes,
    /// `0b11` = 4 bytes), remaining bits plus any continuation bytes form
    /// the value in little-endian order. Matches `_read_int`'s "read one
    /// byte, inspect the low two bits, rewind and re-read the full width"
    /// behavior from the reference parser.
    fn read_varint(&mut self) -> Result<u32>
    where
        Self: std::io::Seek,
    {
        let first = self.read_u8()?;
        let extra_bytes = (first & 0b11) as i64;
        self.seek(std::io::SeekFrom::Current(-1))?;
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes[..=extra_bytes as usize])?;
        let value = u32::from_le_bytes(bytes) >> 2;
        Ok(value)
    }
}

impl<R: Read + ?Sized> JscRead for R {}

/// A cursor over an in-memory byte slice, used as the sole backing store for
/// the whole pipeline: `.jsc` files are small enough to load wholesale.
#[derive(Clone, Debug)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek_to(&mut self, pos: usize) -> Result<()> {
        ensure!(pos <= self.data.len(), "seek past end of buffer");
        self.pos = pos;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

impl<'a> Read for SliceReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl<'a> std::io::Seek for SliceReader<'a> {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        let new_pos = match pos {
            std::io::SeekFrom::Start(p) => p as i64,
            std::io::SeekFrom::End(p) => self.data.len() as i64 + p,
            std::io::SeekFrom::Current(p) => self.pos as i64 + p,
        };
        if new_pos < 0 || new_pos as usize > self.data.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek out of bounds",
            ));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_roundtrip_one_byte() {
        let encoded = [(5u32 << 2) as u8];
        let mut r = SliceReader::new(&encoded);
        assert_eq!(r.read_varint().unwrap(), 5);
    }

    #[test]
    fn varint_roundtrip_four_bytes() {
        let value: u32 = 0x0FFF_FFFF;
        let packed = (value << 2) | 0b11;
        let encoded = packed.to_le_bytes();
        let mut r = SliceReader::new(&encoded);
        assert_eq!(r.read_varint().unwrap(), value);
    }

    #[test]
    fn fixed_width_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut r = SliceReader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u32_le().unwrap(), u32::from_le_bytes([2, 3, 4, 5]));
        assert_eq!(r.read_u8().unwrap(), 0x06);
    }
}
