use chrono::{Local, TimeZone};
use crc32fast::Hasher;
use flate2::read::DeflateDecoder;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Read side of the codec: the parsed Central Directory plus access to
/// each entry's data.
pub struct ZipExtractor<R: ReadAt + ?Sized> {
    parser: ZipParser<R>,
    entries: Vec<ZipFileEntry>,
}

impl<R: ReadAt + ?Sized> ZipExtractor<R> {
    /// Parse the Central Directory of `reader`.
    pub fn open(reader: Arc<R>) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let entries = parser.list_files()?;
        Ok(Self { parser, entries })
    }

    /// All entries, in Central Directory order
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&ZipFileEntry> {
        self.entries.get(index)
    }

    /// Decompress an entry into memory, verifying its size and CRC-32.
    ///
    /// # Arguments
    ///
    /// * `entry` - One of [`entries`](Self::entries)
    ///
    /// # Returns
    ///
    /// The uncompressed bytes; empty for folder entries.
    ///
    /// # Errors
    ///
    /// * [`ZipError::Unsupported`] for encrypted entries and compression
    ///   methods other than STORED and DEFLATE
    /// * [`ZipError::InvalidArchive`] if the data runs past the end of the
    ///   source, fails to inflate, or has the wrong size or CRC-32
    pub fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        if entry.is_encrypted() {
            return Err(ZipError::Unsupported(format!(
                "encrypted entry: {}",
                entry.file_name
            )));
        }

        let data_offset = self.parser.get_data_offset(entry)?;
        let source_size = self.parser.reader().size();
        match data_offset.checked_add(entry.compressed_size) {
            Some(end) if end <= source_size => {}
            _ => {
                return Err(ZipError::InvalidArchive(format!(
                    "{}: data extends past end of archive",
                    entry.file_name
                )));
            }
        }
        let compressed_len = usize::try_from(entry.compressed_size)
            .map_err(|_| ZipError::Unsupported(format!("entry too large: {}", entry.file_name)))?;

        let mut compressed = vec![0u8; compressed_len];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut compressed)?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => compressed,
            CompressionMethod::Deflate => {
                // cap the preallocation; the declared size is untrusted
                let capacity = entry.uncompressed_size.min(64 * 1024 * 1024) as usize;
                let mut out = Vec::with_capacity(capacity);
                DeflateDecoder::new(compressed.as_slice())
                    .take(entry.uncompressed_size.saturating_add(1))
                    .read_to_end(&mut out)
                    .map_err(|e| {
                        ZipError::InvalidArchive(format!("{}: {e}", entry.file_name))
                    })?;
                out
            }
            CompressionMethod::Unknown(method) => {
                return Err(ZipError::Unsupported(format!(
                    "compression method {method} ({})",
                    entry.file_name
                )));
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            return Err(ZipError::InvalidArchive(format!(
                "{}: size mismatch (expected {}, got {})",
                entry.file_name,
                entry.uncompressed_size,
                data.len()
            )));
        }

        let mut hasher = Hasher::new();
        hasher.update(&data);
        if hasher.finalize() != entry.crc32 {
            return Err(ZipError::InvalidArchive(format!(
                "{}: CRC-32 mismatch",
                entry.file_name
            )));
        }

        Ok(data)
    }

    /// Extract an entry to `output_path`, restoring its modification time.
    ///
    /// The parent directory must already exist.
    ///
    /// # Errors
    ///
    /// Anything [`extract_to_memory`](Self::extract_to_memory) reports, plus
    /// [`ZipError::Io`] if the file cannot be created or written.
    pub fn extract_to_file(&self, entry: &ZipFileEntry, output_path: &Path) -> Result<()> {
        let data = self.extract_to_memory(entry)?;

        let mut file = fs::File::create(output_path)?;
        file.write_all(&data)?;

        if let Some(modified) = entry.modified().and_then(local_system_time) {
            file.set_modified(modified)?;
        }

        Ok(())
    }
}

fn local_system_time(naive: chrono::NaiveDateTime) -> Option<SystemTime> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(SystemTime::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::zip::structures::{EndOfCentralDirectory, CDFH_SIGNATURE, LFH_SIGNATURE};
    use byteorder::{LittleEndian, WriteBytesExt};

    /// One stored entry `x` whose Central Directory record claims `claimed`
    /// bytes through a ZIP64 extra field, with no data behind it.
    fn archive_claiming(claimed: u64) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(LFH_SIGNATURE);
        buf.write_u16::<LittleEndian>(20).unwrap(); // version needed
        buf.write_u16::<LittleEndian>(0).unwrap(); // flags
        buf.write_u16::<LittleEndian>(0).unwrap(); // stored
        buf.write_u16::<LittleEndian>(0).unwrap(); // time
        buf.write_u16::<LittleEndian>(0).unwrap(); // date
        buf.write_u32::<LittleEndian>(0).unwrap(); // crc
        buf.write_u32::<LittleEndian>(0).unwrap(); // compressed size
        buf.write_u32::<LittleEndian>(0).unwrap(); // uncompressed size
        buf.write_u16::<LittleEndian>(1).unwrap(); // name length
        buf.write_u16::<LittleEndian>(0).unwrap(); // extra length
        buf.push(b'x');

        let cd_offset = buf.len() as u32;
        buf.extend_from_slice(CDFH_SIGNATURE);
        buf.write_u16::<LittleEndian>(20).unwrap(); // made by
        buf.write_u16::<LittleEndian>(45).unwrap(); // needed
        buf.write_u16::<LittleEndian>(0).unwrap(); // flags
        buf.write_u16::<LittleEndian>(0).unwrap(); // stored
        buf.write_u16::<LittleEndian>(0).unwrap(); // time
        buf.write_u16::<LittleEndian>(0).unwrap(); // date
        buf.write_u32::<LittleEndian>(0).unwrap(); // crc
        buf.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
        buf.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
        buf.write_u16::<LittleEndian>(1).unwrap(); // name length
        buf.write_u16::<LittleEndian>(20).unwrap(); // extra length
        buf.write_u16::<LittleEndian>(0).unwrap(); // comment length
        buf.write_u16::<LittleEndian>(0).unwrap(); // disk
        buf.write_u16::<LittleEndian>(0).unwrap(); // internal attrs
        buf.write_u32::<LittleEndian>(0).unwrap(); // external attrs
        buf.write_u32::<LittleEndian>(0).unwrap(); // LFH offset
        buf.push(b'x');
        buf.write_u16::<LittleEndian>(0x0001).unwrap();
        buf.write_u16::<LittleEndian>(16).unwrap();
        buf.write_u64::<LittleEndian>(claimed).unwrap(); // uncompressed
        buf.write_u64::<LittleEndian>(claimed).unwrap(); // compressed
        let cd_size = buf.len() as u32 - cd_offset;

        EndOfCentralDirectory::new(1, cd_size, cd_offset)
            .write_to(&mut buf)
            .unwrap();
        buf
    }

    #[test]
    fn oversized_entry_is_rejected_before_reading() {
        let extractor = ZipExtractor::open(Arc::new(MemoryReader::new(archive_claiming(1 << 60))))
            .unwrap();
        let entry = extractor.entries()[0].clone();
        assert_eq!(entry.compressed_size, 1 << 60);

        assert!(matches!(
            extractor.extract_to_memory(&entry),
            Err(ZipError::InvalidArchive(_))
        ));
    }

    #[test]
    fn offset_overflow_is_rejected() {
        let extractor =
            ZipExtractor::open(Arc::new(MemoryReader::new(archive_claiming(u64::MAX)))).unwrap();
        let entry = extractor.entries()[0].clone();
        assert!(matches!(
            extractor.extract_to_memory(&entry),
            Err(ZipError::InvalidArchive(_))
        ));
    }
}
