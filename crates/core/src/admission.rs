// crates/core/src/admission.rs
//! Concurrency gate for job admission.
//!
//! A semaphore sized to `max_concurrent`. `try_acquire` is the single
//! atomic check-and-reserve step — there is no window where two
//! submissions can both observe spare capacity. Jobs that don't fit are
//! rejected, not queued.

use std::sync::Arc;

use tokio::sync::{Semaphore, TryAcquireError};

use crate::error::{JobError, Result};

pub struct AdmissionController {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

/// RAII slot reservation. Dropping it releases the slot, so release
/// happens exactly once per job on every worker exit path.
pub struct AdmissionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl AdmissionController {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Atomically reserve a concurrency slot, or fail with `Capacity`.
    pub fn try_acquire(&self) -> Result<AdmissionPermit> {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => Ok(AdmissionPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) => Err(JobError::Capacity(self.max_concurrent)),
            Err(TryAcquireError::Closed) => {
                Err(JobError::Internal("admission semaphore closed".to_string()))
            }
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rejects_beyond_cap() {
        let gate = AdmissionController::new(2);
        let _a = gate.try_acquire().unwrap();
        let _b = gate.try_acquire().unwrap();
        assert!(matches!(gate.try_acquire(), Err(JobError::Capacity(2))));
    }

    #[test]
    fn test_drop_releases_slot() {
        let gate = AdmissionController::new(1);
        let a = gate.try_acquire().unwrap();
        assert_eq!(gate.available(), 0);
        drop(a);
        assert_eq!(gate.available(), 1);
        assert!(gate.try_acquire().is_ok());
    }

    #[test]
    fn test_zero_cap_is_clamped_to_one() {
        let gate = AdmissionController::new(0);
        assert_eq!(gate.max_concurrent(), 1);
        assert!(gate.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_submissions_cannot_both_win_last_slot() {
        let gate = Arc::new(AdmissionController::new(1));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                gate.try_acquire().map(|p| {
                    // Hold the slot long enough for every task to race.
                    std::mem::forget(p);
                })
            }));
        }
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}
