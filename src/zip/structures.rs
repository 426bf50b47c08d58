use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Bzip2,
    Lzma,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            12 => CompressionMethod::Bzip2,
            14 => CompressionMethod::Lzma,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Bzip2 => 12,
            CompressionMethod::Lzma => 14,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Local File Header (LFH) - `PK\x03\x04`
pub const LFH_SIGNATURE: u32 = 0x0403_4b50;

/// Central Directory File Header (CDFH) - `PK\x01\x02`.
/// The first one follows the last local entry.
pub const CDFH_SIGNATURE: u32 = 0x0201_4b50;

/// End of Central Directory (EOCD) - `PK\x05\x06`.
/// Seen directly when the archive holds no entries.
pub const EOCD_SIGNATURE: u32 = 0x0605_4b50;

/// Data descriptor - `PK\x07\x08`. Optional in front of the descriptor fields.
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

/// Flag bit 0: entry is encrypted
const FLAG_ENCRYPTED: u16 = 1 << 0;
/// Flag bit 1: for LZMA, the stream ends with an end-of-stream marker
const FLAG_LZMA_EOS: u16 = 1 << 1;
/// Flag bit 3: sizes and CRC live in a trailing data descriptor
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// Flag bit 11: name is UTF-8
const FLAG_UTF8: u16 = 1 << 11;

/// Fixed part of a local file header, after the signature - 26 bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub const SIZE: usize = 26;

    /// Decode the fixed block. `data` must hold at least [`Self::SIZE`] bytes.
    pub fn from_bytes(data: &[u8]) -> std::io::Result<Self> {
        let mut cursor = Cursor::new(data);

        Ok(Self {
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            compression_method: cursor.read_u16::<LittleEndian>()?,
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn method(&self) -> CompressionMethod {
        CompressionMethod::from_u16(self.compression_method)
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub fn has_lzma_eos_marker(&self) -> bool {
        self.flags & FLAG_LZMA_EOS != 0
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    pub fn is_utf8(&self) -> bool {
        self.flags & FLAG_UTF8 != 0
    }

    /// Bytes of header, name, extra and payload, signature included.
    /// A trailing data descriptor is not counted.
    pub fn record_len(&self) -> u64 {
        4 + Self::SIZE as u64
            + self.file_name_length as u64
            + self.extra_field_length as u64
            + self.compressed_size as u64
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// One local entry as read from the stream
#[derive(Debug, Clone)]
pub struct EntryRecord {
    /// Stream offset of the record's signature
    pub offset: u64,
    pub header: LocalFileHeader,
    /// Name decoded from `raw_name`
    pub name: String,
    pub raw_name: Vec<u8>,
    pub extra: Vec<u8>,
    /// Exactly `header.compressed_size` bytes
    pub payload: Vec<u8>,
    /// Bytes of trailing data descriptor consumed after the payload
    pub descriptor_len: u64,
}

impl EntryRecord {
    /// Bytes this entry occupies in the stream, descriptor included.
    pub fn stream_len(&self) -> u64 {
        self.header.record_len() + self.descriptor_len
    }

    /// Directory markers are entries whose name ends in a separator.
    pub fn is_directory(&self) -> bool {
        is_directory_name(&self.name)
    }
}

pub fn is_directory_name(name: &str) -> bool {
    name.ends_with('/') || name.ends_with('\\')
}
