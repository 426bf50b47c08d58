use std::time::Duration;

use tokio::time::Instant;

/// Bytes between two progress reports for one volume.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 16 * 1024 * 1024;

/// A report is also due when this much time passed since the last one.
const PROGRESS_PERIOD: Duration = Duration::from_secs(5);

/// Download counters for the volume currently being read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Bytes read from this volume so far
    pub read: u64,
    /// Volume length, when the source announced one
    pub total: Option<u64>,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.read as f64 * 100.0 / total as f64),
            _ => None,
        }
    }

    /// Average rate since the volume was opened, in MiB/s.
    pub fn mib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.read as f64 / (1024.0 * 1024.0) / secs
        } else {
            0.0
        }
    }
}

/// Throttles progress reports to one per `byte_interval` bytes (or per
/// [`PROGRESS_PERIOD`], whichever comes first).
#[derive(Debug)]
pub(crate) struct VolumeProgress {
    total: Option<u64>,
    read: u64,
    started: Instant,
    reported_bytes: u64,
    reported_at: Instant,
    byte_interval: u64,
}

impl VolumeProgress {
    pub(crate) fn new(total: Option<u64>, byte_interval: u64) -> Self {
        let now = Instant::now();
        Self {
            total,
            read: 0,
            started: now,
            reported_bytes: 0,
            reported_at: now,
            byte_interval: byte_interval.max(1),
        }
    }

    /// Count `n` more bytes. Returns a snapshot when a report is due.
    pub(crate) fn advance(&mut self, n: u64) -> Option<ProgressSnapshot> {
        self.read += n;

        let now = Instant::now();
        let due = self.read - self.reported_bytes >= self.byte_interval
            || now.duration_since(self.reported_at) >= PROGRESS_PERIOD;
        if !due {
            return None;
        }

        self.reported_bytes = self.read;
        self.reported_at = now;
        Some(self.snapshot())
    }

    pub(crate) fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            read: self.read,
            total: self.total,
            elapsed: self.started.elapsed(),
        }
    }
}
