//! Admission control for fetches
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - Per-host concurrency limiting via one semaphore per host
//! - Pacing between dispatches to the same host
//!
//! A fetch may start only after it holds a global permit and a permit for
//! its host, and after the host's next pacing slot has arrived.

use crate::config::CrawlerConfig;
use crate::state::HostState;
use crate::url::host_key;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use url::Url;

/// Gates fetch dispatch on the global and per-host limits
///
/// Shared by the coordinator (which takes global permits before spawning a
/// task) and by fetch tasks (which take host permits and wait for pacing).
#[derive(Debug)]
pub struct Scheduler {
    /// Global semaphore for limiting concurrent fetches
    global_semaphore: Arc<Semaphore>,

    /// Per-host state tracking
    host_states: Mutex<HashMap<String, HostState>>,

    connections_per_host: usize,

    /// Minimum spacing between dispatches to one host
    delay: Duration,
}

impl Scheduler {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self::with_limits(
            config.concurrent_requests as usize,
            config.connections_per_host as usize,
            config.delay_between_requests(),
        )
    }

    pub fn with_limits(concurrent_requests: usize, connections_per_host: usize, delay: Duration) -> Self {
        Self {
            global_semaphore: Arc::new(Semaphore::new(concurrent_requests.max(1))),
            host_states: Mutex::new(HashMap::new()),
            connections_per_host: connections_per_host.max(1),
            delay,
        }
    }

    /// Takes a global slot if one is free
    ///
    /// The slot is returned when the permit is dropped.
    pub fn try_acquire_global(&self) -> Option<OwnedSemaphorePermit> {
        self.global_semaphore.clone().try_acquire_owned().ok()
    }

    /// Waits for a per-host slot and the host's pacing delay
    ///
    /// The returned permit must be held for the duration of the fetch.
    pub async fn admit(&self, url: &Url) -> Option<OwnedSemaphorePermit> {
        let host = host_key(url);

        let semaphore = {
            let mut states = self.lock_states();
            states
                .entry(host.clone())
                .or_insert_with(|| HostState::new(self.connections_per_host))
                .semaphore
                .clone()
        };
        let permit = semaphore.acquire_owned().await.ok()?;

        let slot = {
            let mut states = self.lock_states();
            states
                .entry(host.clone())
                .or_insert_with(|| HostState::new(self.connections_per_host))
                .reserve_slot(Instant::now(), self.delay)
        };

        let now = Instant::now();
        if slot > now {
            tracing::trace!("Pacing {} for {:?}", host, slot - now);
            tokio::time::sleep_until(slot).await;
        }

        Some(permit)
    }

    fn lock_states(&self) -> std::sync::MutexGuard<'_, HashMap<String, HostState>> {
        self.host_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
