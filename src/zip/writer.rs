//! ZIP archive writer.
//!
//! Entries are written in one pass: each payload is fully buffered, so the
//! CRC-32 and compressed size are known before the Local File Header goes
//! out and no data descriptors are needed. The Central Directory and End of
//! Central Directory are emitted by [`ZipWriter::finish`].

use chrono::{Local, NaiveDateTime};
use crc32fast::Hasher;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::borrow::Cow;
use std::io::Write;

use crate::error::{Result, ZipError};

use super::structures::*;

/// Highest entry count representable without ZIP64
const MAX_ENTRIES: usize = 0xFFFF;
/// Highest size/offset representable without ZIP64
const MAX_32: u64 = 0xFFFF_FFFE;

pub struct ZipWriter<W: Write> {
    inner: W,
    /// Bytes written so far; the next Local File Header starts here
    offset: u64,
    entries: Vec<ZipFileEntry>,
    /// Set when a write failed part-way; `offset` no longer matches the sink
    poisoned: bool,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            offset: 0,
            entries: Vec::new(),
            poisoned: false,
        }
    }

    /// Entries written so far, in write order
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Append one entry.
    ///
    /// A name ending in `/` creates a folder entry, which must carry no data.
    /// Payloads up to [`STORE_THRESHOLD`] bytes are stored, larger ones are
    /// deflated. `modified == None` stamps the entry with the current time.
    pub fn add_entry(
        &mut self,
        name: &str,
        data: &[u8],
        modified: Option<NaiveDateTime>,
    ) -> Result<()> {
        self.check_poisoned()?;
        if name.is_empty() {
            return Err(ZipError::InvalidArchive("empty entry name".into()));
        }
        if self.entries.len() >= MAX_ENTRIES {
            return Err(ZipError::Unsupported(format!(
                "more than {MAX_ENTRIES} entries requires ZIP64"
            )));
        }

        let is_directory = name.ends_with('/');
        if is_directory && !data.is_empty() {
            return Err(ZipError::InvalidArchive(format!(
                "folder entry with data: {name}"
            )));
        }

        let method = if is_directory {
            CompressionMethod::Stored
        } else {
            CompressionMethod::for_size(data.len() as u64)
        };

        let mut hasher = Hasher::new();
        hasher.update(data);
        let crc32 = hasher.finalize();

        let payload: Cow<'_, [u8]> = match method {
            CompressionMethod::Deflate => Cow::Owned(deflate(data)?),
            _ => Cow::Borrowed(data),
        };

        if data.len() as u64 > MAX_32 || payload.len() as u64 > MAX_32 || self.offset > MAX_32 {
            return Err(ZipError::Unsupported(format!(
                "{name}: archive beyond 4 GiB requires ZIP64"
            )));
        }

        let modified = modified.unwrap_or_else(|| Local::now().naive_local());
        let (last_mod_time, last_mod_date) = to_dos_datetime(&modified);

        let external_attrs = if is_directory {
            (UNIX_DIR_MODE << 16) | MSDOS_DIRECTORY
        } else {
            UNIX_FILE_MODE << 16
        };

        let entry = ZipFileEntry {
            file_name: name.to_string(),
            flags: 0,
            compression_method: method,
            compressed_size: payload.len() as u64,
            uncompressed_size: data.len() as u64,
            crc32,
            lfh_offset: self.offset,
            last_mod_time,
            last_mod_date,
            external_attrs,
            is_directory,
        };

        let written = entry
            .write_local_header(&mut self.inner)
            .and_then(|()| self.inner.write_all(&payload));
        if let Err(e) = written {
            self.poisoned = true;
            return Err(e.into());
        }

        self.offset += (LFH_SIZE + name.len() + payload.len()) as u64;
        self.entries.push(entry);
        Ok(())
    }

    /// Write the Central Directory and EOCD, flush, and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.check_poisoned()?;
        let cd_offset = self.offset;
        let mut cd_size = 0u64;

        for entry in &self.entries {
            entry.write_central_header(&mut self.inner)?;
            cd_size += (CDFH_MIN_SIZE + entry.file_name.len()) as u64;
        }

        if cd_offset > MAX_32 || cd_size > MAX_32 {
            return Err(ZipError::Unsupported(
                "central directory beyond 4 GiB requires ZIP64".into(),
            ));
        }

        EndOfCentralDirectory::new(self.entries.len() as u16, cd_size as u32, cd_offset as u32)
            .write_to(&mut self.inner)?;
        self.inner.flush()?;

        Ok(self.inner)
    }
}

impl<W: Write> ZipWriter<W> {
    fn check_poisoned(&self) -> Result<()> {
        if self.poisoned {
            return Err(ZipError::InvalidArchive(
                "an earlier write failed; archive is incomplete".into(),
            ));
        }
        Ok(())
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::zip::ZipExtractor;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn reopen(bytes: Vec<u8>) -> ZipExtractor<MemoryReader> {
        ZipExtractor::open(Arc::new(MemoryReader::new(bytes))).unwrap()
    }

    #[test]
    fn written_archive_reads_back() {
        let long = "lorem ipsum dolor sit amet ".repeat(20);
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_entry("docs/", b"", None).unwrap();
        writer.add_entry("docs/short.txt", b"hi", None).unwrap();
        writer.add_entry("docs/long.txt", long.as_bytes(), None).unwrap();
        let bytes = writer.finish().unwrap();

        assert_eq!(&bytes[..2], b"PK");

        let extractor = reopen(bytes);
        let entries = extractor.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_directory);
        assert_eq!(entries[1].compression_method, CompressionMethod::Stored);
        assert_eq!(entries[2].compression_method, CompressionMethod::Deflate);
        assert!(entries[2].compressed_size < entries[2].uncompressed_size);

        assert_eq!(extractor.extract_to_memory(&entries[1]).unwrap(), b"hi");
        assert_eq!(
            extractor.extract_to_memory(&entries[2]).unwrap(),
            long.as_bytes()
        );
        assert!(extractor.extract_to_memory(&entries[0]).unwrap().is_empty());
    }

    #[test]
    fn explicit_modification_time_is_kept() {
        let when = NaiveDate::from_ymd_opt(2021, 12, 24)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap();
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_entry("a.txt", b"x", Some(when)).unwrap();

        let extractor = reopen(writer.finish().unwrap());
        assert_eq!(extractor.entries()[0].modified(), Some(when));
    }

    #[test]
    fn folder_entries_cannot_carry_data() {
        let mut writer = ZipWriter::new(Vec::new());
        assert!(writer.add_entry("dir/", b"oops", None).is_err());
        assert!(writer.add_entry("", b"", None).is_err());
        assert!(writer.entries().is_empty());
    }

    /// Sink that accepts `limit` bytes and then fails every write
    struct ShortSink {
        data: Vec<u8>,
        limit: usize,
    }

    impl Write for ShortSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let room = self.limit.saturating_sub(self.data.len());
            if room == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::StorageFull, "full"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_refuses_further_use() {
        let sink = ShortSink {
            data: Vec::new(),
            limit: LFH_SIZE + 3,
        };
        let mut writer = ZipWriter::new(sink);
        assert!(matches!(
            writer.add_entry("first.txt", b"payload", None),
            Err(ZipError::Io(_))
        ));
        assert!(writer.entries().is_empty());

        assert!(matches!(
            writer.add_entry("second.txt", b"x", None),
            Err(ZipError::InvalidArchive(_))
        ));
        assert!(matches!(writer.finish(), Err(ZipError::InvalidArchive(_))));
    }

    #[test]
    fn corrupted_payload_fails_crc_check() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_entry("a.txt", b"hello", None).unwrap();
        let mut bytes = writer.finish().unwrap();

        // stored payload starts right after the 30-byte header and 5-byte name
        bytes[LFH_SIZE + 5] ^= 0xFF;

        let extractor = reopen(bytes);
        let entry = extractor.entries()[0].clone();
        assert!(matches!(
            extractor.extract_to_memory(&entry),
            Err(ZipError::InvalidArchive(_))
        ));
    }
}
