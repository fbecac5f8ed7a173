//! # zipkit
//!
//! Read and write ZIP archives through a single stateful session.
//!
//! An [`ArchiveSession`] owns one open archive at a time, either for reading
//! (listing entries, extracting to disk or to memory) or for writing
//! (adding files, whole folder trees and in-memory buffers). The session
//! keeps an index of entry paths in step with the archive, refuses
//! duplicate entries, and converts between filesystem paths and the
//! `/`-separated names used inside the archive.
//!
//! ## Features
//!
//! - Open archives from disk or from a memory buffer
//! - Add files, folders (recursively) and buffered data
//! - Extract everything, one entry, or the contents of one folder
//! - Extract into memory as [`BufferedFile`]s
//! - STORED and DEFLATE entries; small payloads are stored uncompressed
//! - Reads ZIP64 archives
//!
//! ## Example
//!
//! ```no_run
//! use zipkit::{ArchiveSession, OpenHint};
//!
//! fn main() -> zipkit::Result<()> {
//!     // Pack a folder
//!     let mut zip = ArchiveSession::new();
//!     zip.set_archive("site.zip", OpenHint::Write)?;
//!     zip.add_path("public", "site")?;
//!     zip.close()?;
//!
//!     // List and extract it again
//!     let zip = ArchiveSession::open("site.zip")?;
//!     for (index, name) in zip.contents().iter() {
//!         println!("{index}: {name}");
//!     }
//!     zip.extract_all()?;
//!
//!     Ok(())
//! }
//! ```
//!
//! One-shot helpers live in [`convenience`]:
//!
//! ```no_run
//! zipkit::compress("public")?;          // -> public.zip
//! zipkit::extract_to("public.zip", "out")?;
//! # Ok::<(), zipkit::ZipError>(())
//! ```

pub mod archive;
pub mod cli;
pub mod codec;
pub mod error;
pub mod io;
pub mod paths;
pub mod zip;

pub use archive::convenience::{
    self, compress, compress_buffer, compress_buffers, compress_here, compress_list, compress_to,
    extract, extract_to,
};
pub use archive::{ArchiveSession, BufferList, BufferedFile, EntryIndex, Mode, OpenHint};
pub use cli::Cli;
pub use codec::{is_archive, is_zip_file, EntryStat};
pub use error::{ErrorKind, Result, ZipError};
