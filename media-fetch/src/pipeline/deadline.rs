//! Per-download deadline token.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A cancellation token that fires when either its parent is cancelled or
/// the timeout elapses.
#[derive(Debug)]
pub struct Deadline {
    token: CancellationToken,
    timeout: Duration,
    watchdog: JoinHandle<()>,
}

impl Deadline {
    /// Must be called from within a tokio runtime.
    pub fn new(timeout: Duration, parent: &CancellationToken) -> Self {
        let token = parent.child_token();
        let watched = token.clone();
        let watchdog = tokio::spawn(async move {
            tokio::select! {
                _ = watched.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    debug!(timeout_secs = timeout.as_secs_f64(), "Download deadline expired");
                    watched.cancel();
                }
            }
        });

        Self {
            token,
            timeout,
            watchdog,
        }
    }

    /// Token threaded through resolve, fetch and merge.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.watchdog.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let root = CancellationToken::new();
        let deadline = Deadline::new(Duration::from_secs(5), &root);
        assert!(!deadline.is_expired());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(deadline.is_expired());
        assert!(!root.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancellation_propagates() {
        let root = CancellationToken::new();
        let deadline = Deadline::new(Duration::from_secs(3600), &root);
        root.cancel();
        assert!(deadline.is_expired());
    }
}
