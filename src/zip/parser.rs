//! Sequential local-file-header parser.
//!
//! The archive is read front to back exactly once. There is no central
//! directory lookup and no lookahead: every record must be consumed to
//! its last payload byte or the next signature is read from the wrong
//! place. Any short read inside a record is therefore fatal.
//!
//! ## Record layout
//!
//! ```text
//! signature:4 | version:2 | flags:2 | method:2 | mod_time:2 | mod_date:2 |
//! crc32:4 | compressed_size:4 | uncompressed_size:4 | name_len:2 | extra_len:2 |
//! name:name_len | extra:extra_len | payload:compressed_size |
//! [data descriptor, when flag bit 3 is set]
//! ```
//!
//! The loop ends cleanly when the stream is exhausted at a record boundary
//! or when the central directory (or an empty archive's end record) shows up.

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::Encoding;
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::io::VolumeStream;

use super::structures::*;

/// Pulls [`EntryRecord`]s off a [`VolumeStream`] one at a time.
pub struct RecordParser {
    stream: VolumeStream,
    /// Codepage for names without the UTF-8 flag
    codepage: &'static Encoding,
    finished: bool,
}

impl RecordParser {
    pub fn new(stream: VolumeStream, codepage: &'static Encoding) -> Self {
        Self {
            stream,
            codepage,
            finished: false,
        }
    }

    pub fn stream(&self) -> &VolumeStream {
        &self.stream
    }

    /// Read the next record, or `None` once the archive has ended.
    ///
    /// After `None` is returned every later call returns `None` without
    /// touching the stream.
    pub async fn next_record(&mut self) -> Result<Option<EntryRecord>> {
        if self.finished {
            return Ok(None);
        }

        let offset = self.stream.position();
        let sig = self.stream.read(4).await?;

        if sig.is_empty() {
            debug!(offset, "Stream exhausted at record boundary");
            self.finished = true;
            return Ok(None);
        }
        if sig.len() < 4 {
            return Err(ExtractError::format(
                offset,
                format!("truncated signature ({} of 4 bytes)", sig.len()),
            ));
        }

        match LittleEndian::read_u32(&sig) {
            LFH_SIGNATURE => {}
            CDFH_SIGNATURE | EOCD_SIGNATURE => {
                debug!(offset, "Reached central directory");
                self.finished = true;
                return Ok(None);
            }
            other => {
                return Err(ExtractError::format(
                    offset,
                    format!("unexpected signature {other:#010x}"),
                ));
            }
        }

        let block = self
            .read_exact(LocalFileHeader::SIZE, offset, "local file header")
            .await?;
        let mut header = LocalFileHeader::from_bytes(&block)
            .map_err(|e| ExtractError::format(offset, format!("bad local file header: {e}")))?;

        let raw_name = self
            .read_exact(header.file_name_length as usize, offset, "file name")
            .await?;
        let name = decode_name(&raw_name, header.is_utf8(), self.codepage);

        let extra = self
            .read_exact(
                header.extra_field_length as usize,
                offset,
                &format!("extra field of {name}"),
            )
            .await?;

        // With a data descriptor the real size only follows the payload, which
        // a forward-only reader cannot locate.
        if header.has_data_descriptor() && header.compressed_size == 0 && !is_directory_name(&name) {
            return Err(ExtractError::format(
                offset,
                format!("{name} defers its sizes to a data descriptor"),
            ));
        }

        let payload = self
            .read_exact(
                header.compressed_size as usize,
                offset,
                &format!("payload of {name}"),
            )
            .await?;

        let descriptor_len = if header.has_data_descriptor() {
            self.read_data_descriptor(&mut header, offset, &name).await?
        } else {
            0
        };

        debug!(
            offset,
            name = %name,
            method = header.compression_method,
            compressed = header.compressed_size,
            uncompressed = header.uncompressed_size,
            "Parsed local file header"
        );

        Ok(Some(EntryRecord {
            offset,
            header,
            name,
            raw_name,
            extra,
            payload,
            descriptor_len,
        }))
    }

    /// Consume the data descriptor that follows the payload when flag bit 3
    /// is set: `[signature:4] crc32:4 | compressed_size:4 | uncompressed_size:4`.
    ///
    /// The descriptor's CRC and uncompressed size replace the header's.
    /// Returns the number of bytes consumed.
    async fn read_data_descriptor(
        &mut self,
        header: &mut LocalFileHeader,
        record_offset: u64,
        name: &str,
    ) -> Result<u64> {
        let what = format!("data descriptor of {name}");
        let first = self.read_exact(4, record_offset, &what).await?;

        let (fields, consumed) = if LittleEndian::read_u32(&first) == DATA_DESCRIPTOR_SIGNATURE {
            (self.read_exact(12, record_offset, &what).await?, 16)
        } else {
            let mut fields = first;
            fields.extend(self.read_exact(8, record_offset, &what).await?);
            (fields, 12)
        };

        let crc32 = LittleEndian::read_u32(&fields[0..4]);
        let compressed_size = LittleEndian::read_u32(&fields[4..8]);
        let uncompressed_size = LittleEndian::read_u32(&fields[8..12]);

        if compressed_size != header.compressed_size {
            return Err(ExtractError::format(
                record_offset,
                format!(
                    "{what} declares {compressed_size} compressed bytes, header declared {}",
                    header.compressed_size
                ),
            ));
        }

        header.crc32 = crc32;
        header.uncompressed_size = uncompressed_size;
        Ok(consumed)
    }

    async fn read_exact(&mut self, len: usize, record_offset: u64, what: &str) -> Result<Vec<u8>> {
        let data = self.stream.read(len).await?;
        if data.len() != len {
            return Err(ExtractError::format(
                record_offset,
                format!(
                    "short read in {what}: expected {len} bytes, stream ended after {}",
                    data.len()
                ),
            ));
        }
        Ok(data)
    }
}

/// Decode an entry name. Never fails: bad sequences become U+FFFD.
pub fn decode_name(raw: &[u8], utf8: bool, codepage: &'static Encoding) -> String {
    if utf8 {
        return String::from_utf8_lossy(raw).into_owned();
    }
    let (name, _) = codepage.decode_without_bom_handling(raw);
    name.into_owned()
}
