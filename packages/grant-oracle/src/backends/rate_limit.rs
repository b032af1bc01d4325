//! Per-backend minimum-interval rate limiter.
//!
//! Each backend gets a gate holding the instant of its last granted call.
//! Callers for the same backend are serialized on that gate, so two
//! concurrent acquirers can never observe the same "last call" and both
//! proceed. Different backends never wait on each other.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::types::BackendDescriptor;

struct Gate {
    floor: Duration,
    last_granted: Mutex<Option<Instant>>,
}

/// Enforces a per-backend floor between consecutive granted calls.
///
/// Share one instance (behind an `Arc`) across every adapter and session
/// in the process.
#[derive(Default)]
pub struct RateLimiter {
    gates: HashMap<String, Gate>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend with its floor.
    pub fn with_backend(mut self, backend: impl Into<String>, floor: Duration) -> Self {
        self.gates.insert(
            backend.into(),
            Gate {
                floor,
                last_granted: Mutex::new(None),
            },
        );
        self
    }

    /// Register every backend described, using each descriptor's floor.
    pub fn from_descriptors<'a>(descriptors: impl IntoIterator<Item = &'a BackendDescriptor>) -> Self {
        descriptors
            .into_iter()
            .fold(Self::new(), |limiter, d| limiter.with_backend(&d.name, d.min_interval))
    }

    /// Configured floor for a backend.
    pub fn floor(&self, backend: &str) -> Option<Duration> {
        self.gates.get(backend).map(|g| g.floor)
    }

    /// Wait until a call to `backend` is allowed, then record it.
    ///
    /// Returns the instant the call was granted. Unknown backends are
    /// granted immediately. Dropping the returned future before it
    /// completes records nothing.
    pub async fn acquire(&self, backend: &str) -> Instant {
        let Some(gate) = self.gates.get(backend) else {
            warn!(backend, "No rate limit configured for backend; granting immediately");
            return Instant::now();
        };

        let mut last_granted = gate.last_granted.lock().await;
        if let Some(previous) = *last_granted {
            let ready_at = previous + gate.floor;
            let now = Instant::now();
            if ready_at > now {
                debug!(
                    backend,
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "Waiting for rate limit"
                );
                sleep_until(ready_at).await;
            }
        }

        let granted = Instant::now();
        *last_granted = Some(granted);
        granted
    }
}
