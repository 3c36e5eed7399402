use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Tracks the admission state of one host during crawling
///
/// Holds the per-host connection semaphore and the earliest instant at
/// which the next request to the host may start.
#[derive(Debug, Clone)]
pub struct HostState {
    /// Limits concurrent connections to this host
    pub semaphore: Arc<Semaphore>,

    /// Start time reserved for the next request, if any request was made yet
    pub next_slot: Option<Instant>,

    /// Number of requests dispatched to this host
    pub request_count: u32,
}

impl HostState {
    /// Creates a new HostState allowing `connections` concurrent requests
    pub fn new(connections: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(connections.max(1))),
            next_slot: None,
            request_count: 0,
        }
    }

    /// Reserves the next dispatch slot for this host
    ///
    /// Returns the instant the caller must wait for. Consecutive
    /// reservations are spaced by at least `delay`, so callers that reserve
    /// together are still paced one after another.
    pub fn reserve_slot(&mut self, now: Instant, delay: Duration) -> Instant {
        let slot = match self.next_slot {
            Some(next) if next > now => next,
            _ => now,
        };
        self.next_slot = Some(slot + delay);
        self.request_count += 1;
        slot
    }
}
