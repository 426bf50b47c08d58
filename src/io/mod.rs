//! Byte sources for archive volumes.
//!
//! A [`VolumeSource`] turns a locator (URL or path) into an open
//! [`Volume`]; [`VolumeStream`] splices the opened volumes into one
//! forward-only stream.

mod http;
mod local;
mod progress;
pub(crate) mod stream;

pub use http::HttpSource;
pub use local::LocalFileSource;
pub use progress::{DEFAULT_PROGRESS_INTERVAL, ProgressSnapshot};
pub use stream::VolumeStream;

use anyhow::Result;
use async_trait::async_trait;

/// An opened volume, read strictly forward.
#[async_trait]
pub trait Volume: Send {
    /// Read up to `buf.len()` bytes into `buf`.
    ///
    /// Returns `Ok(0)` only when the volume is exhausted (or `buf` is empty).
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Total length of the volume, if known up front.
    fn content_length(&self) -> Option<u64> {
        None
    }
}

/// Opens volumes by locator.
#[async_trait]
pub trait VolumeSource: Send + Sync {
    async fn open(&self, locator: &str) -> Result<Box<dyn Volume>>;
}

pub fn is_http_url(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Routes HTTP(S) locators to [`HttpSource`] and everything else to
/// [`LocalFileSource`].
pub struct SchemeSource {
    http: HttpSource,
    local: LocalFileSource,
}

impl SchemeSource {
    pub fn new(http: HttpSource) -> Self {
        Self {
            http,
            local: LocalFileSource,
        }
    }
}

#[async_trait]
impl VolumeSource for SchemeSource {
    async fn open(&self, locator: &str) -> Result<Box<dyn Volume>> {
        if is_http_url(locator) {
            self.http.open(locator).await
        } else {
            self.local.open(locator).await
        }
    }
}
