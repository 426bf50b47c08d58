use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, warn};

/// Exit status after a second interrupt (128 + SIGINT).
pub const ABORT_EXIT_CODE: i32 = 130;

/// Wait for interrupts from `interrupt`.
///
/// The first one sets `cancel`, so the run stops before the next entry.
/// Returns `true` on the second one; the caller should exit right away.
/// Returns `false` if the signal source fails.
pub async fn watch_interrupts<F, Fut>(cancel: Arc<AtomicBool>, mut interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    warn!("Interrupt received, stopping after the current entry (Ctrl-C again to abort)");
    cancel.store(true, Ordering::Release);

    if interrupt().await.is_err() {
        return false;
    }
    error!("Second interrupt, aborting");
    true
}
