use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while streaming an archive.
///
/// `Transport`, `Format` and `Cancelled` end the run: the byte stream can
/// not be rewound, so nothing after them can be trusted. Every other
/// variant only affects the entry it was raised for.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Transport error on volume {locator}: {source:#}")]
    Transport {
        locator: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Format error at offset {offset:#x}: {reason}")]
    Format { offset: u64, reason: String },

    #[error("Unsupported compression method: {0}")]
    UnsupportedCodec(u16),

    #[error("Encrypted entries are not supported")]
    Encrypted,

    #[error("Decompression failed: {0}")]
    Codec(String),

    #[error("Unsafe entry name: {0:?}")]
    UnsafePath(String),

    #[error("File system error at {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Extraction cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ExtractError>;

impl ExtractError {
    pub(crate) fn format(offset: u64, reason: impl Into<String>) -> Self {
        ExtractError::Format {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Whether this error leaves the stream unusable for later entries.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExtractError::Transport { .. } | ExtractError::Format { .. } | ExtractError::Cancelled
        )
    }
}
