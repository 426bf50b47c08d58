use flate2::Crc;

/// Result of checking decompressed bytes against the declared header values.
///
/// A mismatch is data, not an error: what happens to the file is decided
/// by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub expected_crc: u32,
    pub actual_crc: u32,
    pub expected_size: u64,
    pub actual_size: u64,
}

impl Verification {
    pub fn crc_matches(&self) -> bool {
        self.expected_crc == self.actual_crc
    }

    pub fn size_matches(&self) -> bool {
        self.expected_size == self.actual_size
    }

    pub fn is_match(&self) -> bool {
        self.crc_matches() && self.size_matches()
    }
}

/// CRC-32 (IEEE, the zlib/deflate table)
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

pub fn verify(data: &[u8], expected_crc: u32, expected_size: u64) -> Verification {
    Verification {
        expected_crc,
        actual_crc: crc32(data),
        expected_size,
        actual_size: data.len() as u64,
    }
}
