use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use encoding_rs::Encoding;
use tracing::{debug, error, info, warn};

use crate::error::{ExtractError, Result};
use crate::io::VolumeStream;

use super::codec;
use super::integrity::{self, Verification};
use super::parser::RecordParser;
use super::sink::{OutputSink, mismatch_path};
use super::structures::EntryRecord;

/// Settings for one extraction run
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Destination directory, created if absent
    pub output_dir: PathBuf,
    /// Codepage for entry names without the UTF-8 flag
    pub codepage: &'static Encoding,
    /// Check CRC-32 and size of every written file
    pub verify: bool,
    /// Abort the run on the first entry that fails
    pub fail_fast: bool,
}

impl ExtractOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            codepage: encoding_rs::GBK,
            verify: true,
            fail_fast: false,
        }
    }
}

/// What happened to one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Directory,
    Verified,
    Unverified,
    /// Written, but under the mismatch name
    Mismatch(Verification),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct EntryOutcome {
    pub name: String,
    /// Stream offset of the entry's record
    pub offset: u64,
    pub path: Option<PathBuf>,
    pub status: EntryStatus,
}

/// Summary of a completed run
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub entries: Vec<EntryOutcome>,
    pub bytes_read: u64,
    pub volumes: usize,
}

impl ExtractReport {
    fn count(&self, pred: impl Fn(&EntryStatus) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.status)).count()
    }

    pub fn directories(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Directory))
    }

    pub fn files(&self) -> usize {
        self.count(|s| {
            matches!(
                s,
                EntryStatus::Verified | EntryStatus::Unverified | EntryStatus::Mismatch(_)
            )
        })
    }

    pub fn mismatches(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Mismatch(_)))
    }

    pub fn failures(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.mismatches() == 0 && self.failures() == 0
    }
}

/// Drives the per-entry loop over a [`VolumeStream`].
///
/// Entries are handled strictly in stream order: the next signature is not
/// read until the previous entry is on disk.
pub struct Extractor {
    options: ExtractOptions,
    sink: OutputSink,
    cancel: Arc<AtomicBool>,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        let sink = OutputSink::new(options.output_dir.clone());
        Self {
            options,
            sink,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use `flag` as the cancellation signal. It is checked between entries.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Extract every entry of the stream.
    ///
    /// Fatal conditions (transport, format, cancellation) end the run with
    /// an error. Per-entry failures are recorded in the report, unless
    /// `fail_fast` is set.
    pub async fn run(&self, stream: VolumeStream) -> Result<ExtractReport> {
        self.sink.prepare().await?;
        info!(output = %self.sink.base().display(), "Extraction started");

        let mut parser = RecordParser::new(stream, self.options.codepage);
        let mut report = ExtractReport::default();

        loop {
            if self.cancel.load(Ordering::Acquire) {
                warn!(
                    offset = parser.stream().position(),
                    "Cancelled after {} entries",
                    report.entries.len()
                );
                return Err(ExtractError::Cancelled);
            }

            let record = match parser.next_record().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(err) => {
                    error!(entry = report.entries.len(), "Aborting: {err}");
                    return Err(err);
                }
            };

            let name = record.name.clone();
            let offset = record.offset;

            match self.process(record).await {
                Ok(outcome) => report.entries.push(outcome),
                Err(err) if self.options.fail_fast || err.is_fatal() => {
                    error!(entry = %name, offset, "Aborting: {err}");
                    return Err(err);
                }
                Err(err) => {
                    error!(entry = %name, offset, "Entry failed: {err}");
                    report.entries.push(EntryOutcome {
                        name,
                        offset,
                        path: None,
                        status: EntryStatus::Failed(err.to_string()),
                    });
                }
            }
        }

        report.bytes_read = parser.stream().position();
        report.volumes = parser.stream().volumes_opened();

        info!(
            files = report.files(),
            directories = report.directories(),
            mismatches = report.mismatches(),
            failures = report.failures(),
            bytes = report.bytes_read,
            volumes = report.volumes,
            "Extraction finished"
        );

        Ok(report)
    }

    async fn process(&self, record: EntryRecord) -> Result<EntryOutcome> {
        if record.is_directory() {
            let path = self.sink.create_dir(&record.name).await?;
            debug!(entry = %record.name, "Created directory");
            return Ok(EntryOutcome {
                name: record.name,
                offset: record.offset,
                path: Some(path),
                status: EntryStatus::Directory,
            });
        }

        let target = self.sink.resolve(&record.name)?;
        if record.header.is_encrypted() {
            return Err(ExtractError::Encrypted);
        }
        if record.name.contains(char::REPLACEMENT_CHARACTER) {
            warn!(entry = %record.name, raw = ?record.raw_name, "Entry name is not valid in the codepage");
        }

        let EntryRecord {
            offset,
            header,
            name,
            payload,
            ..
        } = record;

        let (year, month, day) = header.mod_date();
        let (hour, minute, second) = header.mod_time();
        info!(
            entry = %name,
            method = ?header.method(),
            size = header.compressed_size,
            "Extracting"
        );
        debug!(
            "{name} last modified {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
        );

        let verify = self.options.verify;
        let (data, verification) = tokio::task::spawn_blocking(move || -> Result<_> {
            let data = codec::decompress(&header, &payload)?;
            let verification = verify
                .then(|| integrity::verify(&data, header.crc32, header.uncompressed_size as u64));
            Ok((data, verification))
        })
        .await
        .map_err(|e| ExtractError::Codec(format!("decompression task failed: {e}")))??;

        let (path, stale, status) = match verification {
            Some(v) if !v.is_match() => {
                warn!(
                    entry = %name,
                    expected_crc = %format!("{:#010x}", v.expected_crc),
                    actual_crc = %format!("{:#010x}", v.actual_crc),
                    expected_size = v.expected_size,
                    actual_size = v.actual_size,
                    "Verification failed, keeping file with {} suffix",
                    super::sink::MISMATCH_SUFFIX
                );
                (mismatch_path(&target), target, EntryStatus::Mismatch(v))
            }
            Some(_) => (target.clone(), mismatch_path(&target), EntryStatus::Verified),
            None => (target.clone(), mismatch_path(&target), EntryStatus::Unverified),
        };

        self.sink.write_file(&path, data).await?;
        // the other name belongs to an earlier run of the same entry
        if self.sink.remove_stale(&stale).await? {
            warn!(entry = %name, path = %stale.display(), "Removed file left by an earlier run");
        }
        info!(entry = %name, "Extracted");

        Ok(EntryOutcome {
            name,
            offset,
            path: Some(path),
            status,
        })
    }
}
