//! Bounds-checked little-endian cursor

use crate::DecodeError;

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::Truncated {
                offset: self.pos,
                needed: len,
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// u32 length-prefixed UTF-8 string
    pub fn read_string(&mut self, what: &'static str) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::Utf8(what))
    }

    /// Referent array: byte-interleaved big-endian words, zigzag encoded,
    /// each value a delta from the previous referent
    pub fn read_referents(&mut self, count: usize) -> Result<Vec<i32>, DecodeError> {
        let len = count.checked_mul(4).ok_or(DecodeError::Truncated {
            offset: self.pos,
            needed: usize::MAX,
        })?;
        let data = self.read_bytes(len)?;

        let mut referents = Vec::with_capacity(count);
        let mut referent = 0i32;
        for i in 0..count {
            let word = u32::from_be_bytes([
                data[i],
                data[i + count],
                data[i + count * 2],
                data[i + count * 3],
            ]);
            referent = referent.wrapping_add(untransform(word));
            referents.push(referent);
        }
        Ok(referents)
    }
}

/// Undo the zigzag transform (even -> v / 2, odd -> -(v + 1) / 2)
fn untransform(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untransform() {
        assert_eq!(untransform(0), 0);
        assert_eq!(untransform(1), -1);
        assert_eq!(untransform(2), 1);
        assert_eq!(untransform(3), -2);
        assert_eq!(untransform(u32::MAX), i32::MIN);
    }

    #[test]
    fn test_interleaved_delta_referents() {
        // Deltas 1, 2, -1 -> zigzag 2, 4, 1, interleaved by byte plane
        let bytes = [0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 4, 1];
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_referents(3).unwrap(), vec![1, 3, 2]);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_truncated_reads() {
        let mut reader = Reader::new(&[1, 0, 0]);
        assert!(matches!(
            reader.read_u32(),
            Err(DecodeError::Truncated { offset: 0, needed: 4 })
        ));

        let mut reader = Reader::new(&[5, 0, 0, 0, b'a']);
        assert!(reader.read_string("name").is_err());
    }
}
