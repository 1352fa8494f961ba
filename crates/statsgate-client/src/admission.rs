//! Admission control
//!
//! Two stages sit in front of the token bucket:
//!
//! - [`AdmissionQueue`] counts requests that are queued or in flight and
//!   rejects new ones immediately once `queue_limit` is reached. A rejected
//!   request never touches the network.
//! - [`ConcurrencyGate`] bounds how many admitted requests may be executing
//!   (acquiring tokens, sending, backing off) at the same time.
//!
//! Both release their slot on drop, so every exit path (success, error,
//! cancellation, panic unwinding) gives the capacity back.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::ApiError;

/// Fail-fast bound on queued plus in-flight requests.
#[derive(Debug)]
pub struct AdmissionQueue {
    limit: usize,
    pending: Arc<AtomicUsize>,
}

/// Slot in the [`AdmissionQueue`]; released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    pending: Arc<AtomicUsize>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

impl AdmissionQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Claims a slot, or fails immediately when the queue is full.
    ///
    /// # Errors
    /// Returns [`ApiError::AdmissionRejected`] when `limit` requests are
    /// already queued or in flight.
    pub fn enter(&self) -> Result<AdmissionPermit, ApiError> {
        let previous = self.pending.fetch_add(1, Ordering::AcqRel);
        if previous >= self.limit {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            warn!(limit = self.limit, "Admission queue full, rejecting request");
            return Err(ApiError::AdmissionRejected { limit: self.limit });
        }

        Ok(AdmissionPermit {
            pending: Arc::clone(&self.pending),
        })
    }

    /// Requests currently queued or in flight.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Bound on simultaneously executing requests.
#[derive(Debug)]
pub struct ConcurrencyGate {
    max: usize,
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyGate {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            semaphore: Arc::new(Semaphore::new(max)),
        }
    }

    /// Waits for an execution slot.
    ///
    /// # Errors
    /// Returns [`ApiError::Cancelled`] if `cancel` fires while waiting.
    pub async fn enter(&self, cancel: &CancellationToken) -> Result<OwnedSemaphorePermit, ApiError> {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                // The semaphore is never closed.
                permit.map_err(|_| ApiError::Cancelled)
            }
        }
    }

    /// Requests currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max.saturating_sub(self.semaphore.available_permits())
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_queue_admits_up_to_limit() {
        let queue = AdmissionQueue::new(2);
        let first = queue.enter().unwrap();
        let _second = queue.enter().unwrap();
        assert_eq!(queue.pending(), 2);

        let rejected = queue.enter();
        assert!(matches!(
            rejected,
            Err(ApiError::AdmissionRejected { limit: 2 })
        ));
        // A rejection does not leak a slot.
        assert_eq!(queue.pending(), 2);

        drop(first);
        assert_eq!(queue.pending(), 1);
        assert!(queue.enter().is_ok());
    }

    #[test]
    fn test_concurrent_enter_never_exceeds_limit() {
        let queue = Arc::new(AdmissionQueue::new(5));
        let held = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut handles = Vec::new();

        for _ in 0..20 {
            let queue = Arc::clone(&queue);
            let held = Arc::clone(&held);
            handles.push(std::thread::spawn(move || match queue.enter() {
                Ok(permit) => {
                    held.lock().unwrap().push(permit);
                    true
                }
                Err(_) => false,
            }));
        }

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 5);
        assert_eq!(queue.pending(), 5);

        held.lock().unwrap().clear();
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_gate_tracks_in_flight() {
        let gate = ConcurrencyGate::new(2);
        let cancel = CancellationToken::new();
        assert_eq!(gate.in_flight(), 0);

        let a = gate.enter(&cancel).await.unwrap();
        let b = gate.enter(&cancel).await.unwrap();
        assert_eq!(gate.in_flight(), 2);

        drop(a);
        assert_eq!(gate.in_flight(), 1);
        drop(b);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_blocks_until_slot_released() {
        let gate = Arc::new(ConcurrencyGate::new(1));
        let cancel = CancellationToken::new();
        let held = gate.enter(&cancel).await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.enter(&cancel).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_gate_wait_is_cancellable() {
        let gate = Arc::new(ConcurrencyGate::new(1));
        let cancel = CancellationToken::new();
        let _held = gate.enter(&cancel).await.unwrap();

        let waiter_cancel = CancellationToken::new();
        let waiter = {
            let gate = Arc::clone(&gate);
            let waiter_cancel = waiter_cancel.clone();
            tokio::spawn(async move { gate.enter(&waiter_cancel).await.map(|_| ()) })
        };

        waiter_cancel.cancel();
        assert!(matches!(waiter.await.unwrap(), Err(ApiError::Cancelled)));
        assert_eq!(gate.in_flight(), 1);
    }
}
