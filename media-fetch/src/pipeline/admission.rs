//! Admission controller bounding concurrent pipelines.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Slot held by an admitted request. The slot is released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

/// Bounded-capacity gate of size `max_concurrent`.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    wait_limit: Duration,
}

impl AdmissionController {
    pub fn new(capacity: usize, wait_limit: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            wait_limit,
        }
    }

    /// Acquire a slot, waiting at most the configured wait limit.
    pub async fn acquire(&self) -> Result<AdmissionPermit> {
        self.acquire_within(self.wait_limit).await
    }

    /// Acquire a slot, waiting at most `wait`.
    pub async fn acquire_within(&self, wait: Duration) -> Result<AdmissionPermit> {
        match tokio::time::timeout(wait, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => {
                debug!(in_flight = self.in_flight(), capacity = self.capacity, "Admitted request");
                Ok(AdmissionPermit { _permit: permit })
            }
            Ok(Err(_closed)) => Err(Error::Other("admission gate closed".to_string())),
            Err(_elapsed) => {
                warn!(
                    capacity = self.capacity,
                    wait_secs = wait.as_secs_f64(),
                    "Admission wait limit exceeded"
                );
                Err(Error::AdmissionTimeout)
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_extra_request_times_out() {
        let gate = AdmissionController::new(2, Duration::from_secs(30));
        let _a = gate.acquire().await.unwrap();
        let _b = gate.acquire().await.unwrap();
        assert_eq!(gate.in_flight(), 2);

        let err = gate.acquire().await.unwrap_err();
        assert!(matches!(err, Error::AdmissionTimeout));
        assert_eq!(gate.in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_proceeds_after_release() {
        let gate = AdmissionController::new(1, Duration::from_secs(30));
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await })
        };

        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(held);

        let permit = waiter.await.unwrap().unwrap();
        assert_eq!(gate.in_flight(), 1);
        drop(permit);
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(AdmissionController::new(0, Duration::ZERO).capacity(), 1);
    }
}
