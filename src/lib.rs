//! # streamzip
//!
//! Extract a ZIP archive that is split across an ordered list of volumes
//! (HTTP URLs or local files) in a single forward pass, while it downloads.
//!
//! Game installers are commonly shipped as `game.zip.001`, `game.zip.002`,
//! ... where each part is a plain byte slice of one ZIP file. Instead of
//! downloading and joining them first, this crate splices the volumes into
//! one stream and reads the local file headers in order, writing each
//! entry as soon as its last byte has arrived.
//!
//! ## Features
//!
//! - Volumes from HTTP(S) or the local filesystem, opened lazily
//! - STORED, DEFLATE, BZIP2 and LZMA entries
//! - CRC-32 verification; mismatching files are kept under a marked name
//! - Legacy codepage (GBK by default) entry names
//! - Atomic writes, so an interrupted run never leaves a half-written file
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamzip::{ExtractOptions, Extractor, HttpSource, SchemeSource, VolumeStream};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = Arc::new(SchemeSource::new(HttpSource::new(5)?));
//!     let volumes = vec![
//!         "https://example.com/game.zip.001".to_string(),
//!         "https://example.com/game.zip.002".to_string(),
//!     ];
//!
//!     let extractor = Extractor::new(ExtractOptions::new("output"));
//!     let report = extractor.run(VolumeStream::new(source, volumes)).await?;
//!     println!("{} files, {} mismatches", report.files(), report.mismatches());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod interrupt;
pub mod io;
pub mod resolve;
pub mod zip;

pub use cli::Cli;
pub use error::{ExtractError, Result};
pub use io::{HttpSource, LocalFileSource, SchemeSource, Volume, VolumeSource, VolumeStream};
pub use resolve::{HypResolver, StaticResolver, VolumeResolver};
pub use zip::{EntryOutcome, EntryStatus, ExtractOptions, ExtractReport, Extractor};
