//! Reconciliation store: arbitrates between live telemetry and simulation.
//!
//! The store is an owned object, created once in `main` and shared with the
//! routes as `Arc<ReconciliationStore>`. It lives as long as the router.
//! The last live reading and its arrival time are kept together behind a
//! single lock, so a reader never sees a reading paired with another
//! reading's timestamp.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::simulation::ReadingProvider;
use crate::{DataSource, Reading};

// ---

/// Default staleness window.
pub const DEFAULT_STALE_AFTER_MS: i64 = 10_000;

pub type SharedStore = Arc<ReconciliationStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The fallback provider panicked while generating a reading.
    #[error("fallback provider failed: {0}")]
    ProviderPanicked(String),
}

/// What the serving path gets back from [`ReconciliationStore::read`].
#[derive(Debug, Clone)]
pub struct Snapshot {
    // ---
    pub reading: Reading,
    pub source: DataSource,
    /// Arrival time of the most recent telemetry, even when stale.
    pub last_update: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn is_live(&self) -> bool {
        self.source == DataSource::Live
    }
}

#[derive(Debug, Clone)]
struct LiveSample {
    reading: Reading,
    received_at: DateTime<Utc>,
}

pub struct ReconciliationStore {
    // ---
    live: RwLock<Option<LiveSample>>,
    fallback: Arc<dyn ReadingProvider>,
    stale_after: Duration,
}

impl ReconciliationStore {
    // ---
    /// Create an empty store that falls back to `fallback` once telemetry is
    /// older than `stale_after`.
    pub fn new(fallback: Arc<dyn ReadingProvider>, stale_after: Duration) -> Self {
        // ---
        Self {
            live: RwLock::new(None),
            fallback,
            stale_after,
        }
    }

    /// Replace the live reading and its arrival time.
    ///
    /// Writes are unconditional: a write carrying an older `at` than the
    /// current one still wins.
    pub fn write(&self, reading: Reading, at: DateTime<Utc>) {
        // ---
        let mut live = self.write_guard();

        if let Some(prev) = live.as_ref() {
            if at < prev.received_at {
                warn!(
                    "Out-of-order telemetry: {} arrived after {}, overwriting anyway",
                    at, prev.received_at
                );
            }
        }

        *live = Some(LiveSample {
            reading,
            received_at: at,
        });
    }

    /// Current reading as of `now`.
    ///
    /// Returns the stored reading while `now - last_update < stale_after`,
    /// otherwise a freshly generated one from the fallback provider. Fails
    /// only if the provider panics.
    pub fn read(&self, now: DateTime<Utc>) -> Result<Snapshot, StoreError> {
        // ---
        let sample = self.read_guard().clone();

        match sample {
            Some(s) if now.signed_duration_since(s.received_at) < self.stale_after => {
                Ok(Snapshot {
                    reading: s.reading,
                    source: DataSource::Live,
                    last_update: Some(s.received_at),
                })
            }
            other => {
                let last_update = other.map(|s| s.received_at);
                if let Some(at) = last_update {
                    debug!("Telemetry from {} is stale, serving simulated data", at);
                }
                let generate = AssertUnwindSafe(|| self.fallback.generate(now));
                let reading = panic::catch_unwind(generate)
                    .map_err(|payload| StoreError::ProviderPanicked(panic_message(payload)))?;
                Ok(Snapshot {
                    reading,
                    source: DataSource::Simulated,
                    last_update,
                })
            }
        }
    }

    // The guarded value is a single `Option` replaced by assignment, so a
    // panic while the lock was held cannot leave it half-written.
    fn read_guard(&self) -> RwLockReadGuard<'_, Option<LiveSample>> {
        self.live.read().unwrap_or_else(|poisoned| {
            warn!("Reconciliation lock was poisoned, recovering");
            self.live.clear_poison();
            PoisonError::into_inner(poisoned)
        })
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Option<LiveSample>> {
        self.live.write().unwrap_or_else(|poisoned| {
            warn!("Reconciliation lock was poisoned, recovering");
            self.live.clear_poison();
            PoisonError::into_inner(poisoned)
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    // ---
    let msg = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    error!("Fallback provider panicked: {}", msg);
    msg
}
