use crate::error::{LoadError, Result};

/// Forward-only reader over the artifact bytes
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    pub fn u8(&mut self) -> Result<u8> {
        let b = self.bytes.get(self.pos).copied().ok_or(LoadError::Truncated {
            offset: self.pos,
            needed: 1,
        })?;
        self.pos += 1;
        Ok(b)
    }

    /// Take `n` bytes; the length is checked before anything is allocated.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(LoadError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Take a length declared as a 64-bit prefix.
    pub fn take_u64_len(&mut self, n: u64) -> Result<&'a [u8]> {
        let n = usize::try_from(n).map_err(|_| LoadError::Truncated {
            offset: self.pos,
            needed: usize::MAX,
        })?;
        self.take(n)
    }

    pub fn u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32_le(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64_le(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn f64_be(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(f64::from_be_bytes(buf))
    }

    /// Read up to and excluding the next `\n`, consuming the newline.
    pub fn line(&mut self) -> Result<&'a [u8]> {
        let rest = &self.bytes[self.pos.min(self.bytes.len())..];
        let Some(end) = rest.iter().position(|b| *b == b'\n') else {
            return Err(LoadError::Truncated {
                offset: self.bytes.len(),
                needed: 1,
            });
        };
        let line = &rest[..end];
        self.pos += end + 1;
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_operands() {
        let mut cur = Cursor::new(&[0x01, 0x02, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(cur.u16_le().unwrap(), 0x0201);
        assert_eq!(cur.i32_le().unwrap(), -1);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn oversized_take_reports_truncation_without_moving() {
        let mut cur = Cursor::new(b"abc");
        let err = cur.take(10).unwrap_err();
        assert!(matches!(err, LoadError::Truncated { offset: 0, needed: 7 }));
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn line_requires_terminator() {
        let mut cur = Cursor::new(b"I12\nI");
        assert_eq!(cur.u8().unwrap(), b'I');
        assert_eq!(cur.line().unwrap(), b"12");
        assert_eq!(cur.u8().unwrap(), b'I');
        assert!(cur.line().is_err());
    }
}
