//! The archive session and the pieces it is built from.
//!
//! - [`ArchiveSession`]: owns one open archive and enforces its mode
//! - [`EntryIndex`]: path → index table kept in step with the codec
//! - [`BufferedFile`] / [`BufferList`]: in-memory entries
//! - `ingest`: walking directories into entries
//! - [`convenience`]: one-shot extract/compress helpers

/// Progress narration: `info` when the session is verbose, `debug` otherwise.
macro_rules! narrate {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

mod buffer;
pub mod convenience;
mod index;
mod ingest;
mod session;

pub use buffer::{BufferList, BufferedFile};
pub use index::EntryIndex;
pub use session::{ArchiveSession, Mode, OpenHint};
