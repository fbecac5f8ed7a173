use super::ReadAt;
use std::io;

/// Archive bytes held in memory
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ReadAt for MemoryReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_clamped_to_the_buffer() {
        let reader = MemoryReader::new(b"PK\x03\x04rest".to_vec());
        let mut buf = [0u8; 4];
        assert_eq!(reader.read_at(6, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"st");
        assert_eq!(reader.read_at(100, &mut buf).unwrap(), 0);
    }

    #[test]
    fn read_exact_at_reports_eof() {
        let reader = MemoryReader::new(vec![1, 2, 3]);
        let mut buf = [0u8; 4];
        let err = reader.read_exact_at(0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
