//! Streaming ZIP extraction.
//!
//! The archive is consumed front to back as a sequence of local entries.
//! The central directory is never used, which is what lets an archive
//! split over many remote volumes be extracted while it downloads.
//!
//! ## Architecture
//!
//! - [`structures`]: on-wire record layout and method ids
//! - [`parser`]: reads one local entry per call from a [`VolumeStream`](crate::io::VolumeStream)
//! - [`codec`]: stored / deflate / bzip2 / LZMA decompression
//! - [`integrity`]: CRC-32 and size checks
//! - [`sink`]: path sanitisation and atomic file writes
//! - [`extractor`]: the per-entry loop tying the above together
//!
//! ## Limitations
//!
//! - No ZIP64, encryption or multi-disk central directories
//! - Entries that defer their sizes to a data descriptor cannot be streamed

pub mod codec;
pub mod extractor;
pub mod integrity;
pub mod parser;
pub mod sink;
pub mod structures;

pub use extractor::{EntryOutcome, EntryStatus, ExtractOptions, ExtractReport, Extractor};
pub use integrity::Verification;
pub use parser::RecordParser;
pub use sink::OutputSink;
pub use structures::*;
