//! Global concurrency limiting for proxy fetches
//!
//! One [`ConcurrencyLimiter`] is owned by each dispatcher and bounds the number
//! of in-flight fetch attempts across every batch that dispatcher runs.

use crate::crawler::request::TransportError;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Semaphore, SemaphorePermit};

/// Semaphore-backed limiter with in-flight accounting
pub struct ConcurrencyLimiter {
    semaphore: Semaphore,
    max_concurrent: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// A held concurrency slot; the slot is released when the permit drops
pub struct LimiterPermit<'a> {
    _permit: SemaphorePermit<'a>,
    in_flight: &'a AtomicUsize,
}

impl Drop for LimiterPermit<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    /// Creates a limiter admitting at most `max_concurrent` holders (minimum 1)
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Waits for a free slot
    ///
    /// Fails with [`TransportError::Closed`] once the limiter is closed.
    pub async fn acquire(&self) -> Result<LimiterPermit<'_>, TransportError> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| TransportError::Closed)?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        Ok(LimiterPermit {
            _permit: permit,
            in_flight: &self.in_flight,
        })
    }

    /// Rejects all current and future waiters
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of slots currently held
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously held slots observed so far
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
