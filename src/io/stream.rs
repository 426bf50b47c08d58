use std::sync::Arc;

use tracing::info;

use super::progress::{DEFAULT_PROGRESS_INTERVAL, ProgressSnapshot, VolumeProgress};
use super::{Volume, VolumeSource};
use crate::error::{ExtractError, Result};

/// The logical concatenation of an ordered list of volumes.
///
/// Volumes are opened lazily, one at a time, and only ever move forward:
/// once a volume reports exhaustion it is dropped and never reopened.
pub struct VolumeStream {
    source: Arc<dyn VolumeSource>,
    locators: Vec<String>,
    /// Index of the next locator to open.
    next: usize,
    current: Option<Box<dyn Volume>>,
    /// Download counters of `current`
    progress: Option<VolumeProgress>,
    progress_interval: u64,
    /// Total bytes handed out so far.
    position: u64,
}

impl VolumeStream {
    pub fn new(source: Arc<dyn VolumeSource>, locators: Vec<String>) -> Self {
        Self {
            source,
            locators,
            next: 0,
            current: None,
            progress: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            position: 0,
        }
    }

    /// Report download progress every `bytes` bytes within a volume.
    pub fn with_progress_interval(mut self, bytes: u64) -> Self {
        self.progress_interval = bytes;
        self
    }

    /// Offset of the next byte within the concatenated stream.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of volumes opened so far.
    pub fn volumes_opened(&self) -> usize {
        self.next
    }

    /// Read `len` bytes, splicing across volume boundaries.
    ///
    /// The result is shorter than `len` only when every volume is
    /// exhausted; whether that is acceptable is up to the caller.
    pub async fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let filled = self.read_into(&mut buf).await?;
        buf.truncate(filled);
        Ok(buf)
    }

    /// Fill as much of `buf` as the remaining volumes allow.
    pub async fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;

        while filled < buf.len() {
            let Some(volume) = self.current.as_mut() else {
                if self.advance().await? {
                    continue;
                }
                break;
            };

            let read = volume.read(&mut buf[filled..]).await;
            let n = match read {
                Ok(n) => n,
                Err(source) => {
                    return Err(ExtractError::Transport {
                        locator: self.locators[self.next - 1].clone(),
                        source,
                    });
                }
            };

            if n == 0 {
                // Exhausted. Dropping the handle closes it.
                self.current = None;
                if let Some(progress) = self.progress.take() {
                    let snapshot = progress.snapshot();
                    info!(
                        volume = self.next,
                        bytes = snapshot.read,
                        speed = %format!("{:.2} MiB/s", snapshot.mib_per_sec()),
                        "Volume finished"
                    );
                }
                continue;
            }

            filled += n;
            self.position += n as u64;

            if let Some(snapshot) = self.progress.as_mut().and_then(|p| p.advance(n as u64)) {
                self.report_progress(&snapshot);
            }
        }

        Ok(filled)
    }

    fn report_progress(&self, snapshot: &ProgressSnapshot) {
        let percent = snapshot
            .percent()
            .map(|p| format!("{p:.1}%"))
            .unwrap_or_else(|| "?".to_string());
        info!(
            volume = self.next,
            offset = self.position,
            read = snapshot.read,
            total = ?snapshot.total,
            percent = %percent,
            speed = %format!("{:.2} MiB/s", snapshot.mib_per_sec()),
            "Download progress"
        );
    }

    /// Open the next volume. Returns `false` once the list is used up.
    async fn advance(&mut self) -> Result<bool> {
        let Some(locator) = self.locators.get(self.next) else {
            return Ok(false);
        };

        if self.next > 0 {
            info!(
                offset = self.position,
                volume = self.next + 1,
                total = self.locators.len(),
                "Switching volume: {}",
                locator
            );
        } else {
            info!(total = self.locators.len(), "Opening first volume: {}", locator);
        }

        let volume = self
            .source
            .open(locator)
            .await
            .map_err(|source| ExtractError::Transport {
                locator: locator.clone(),
                source,
            })?;

        self.next += 1;
        self.progress = Some(VolumeProgress::new(
            volume.content_length(),
            self.progress_interval,
        ));
        self.current = Some(volume);
        Ok(true)
    }
}
