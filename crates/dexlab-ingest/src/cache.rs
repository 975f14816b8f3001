//! Memoizing lookup cache for cross-referenced values.
//!
//! Two tables:
//! - `completed`: key → value for every lookup that succeeded. Never evicted.
//! - `in_flight`: key → the attempt currently running for it. Concurrent
//!   first-time callers for one key all await the same attempt, so the
//!   underlying resolver runs once.
//!
//! Failed attempts are not cached. Callers coalesced onto a failing attempt
//! all receive the default; the next call after it finishes resolves again.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Value returned when a lookup fails or the payload is unrecognized.
pub const DEFAULT_CLASSIFICATION: u32 = 1;

#[derive(Debug, Clone, Copy)]
struct Attempt {
    value: u32,
    resolved: bool,
}

#[derive(Debug)]
pub struct LookupCache {
    completed: RwLock<HashMap<String, u32>>,
    in_flight: Mutex<HashMap<String, Arc<OnceCell<Attempt>>>>,
    resolutions: AtomicUsize,
    default: u32,
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::with_default(DEFAULT_CLASSIFICATION)
    }
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(default: u32) -> Self {
        Self {
            completed: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            resolutions: AtomicUsize::new(0),
            default,
        }
    }

    /// Return the cached value for `key`, running `resolver` only when no
    /// value is cached and no attempt is already in flight.
    pub async fn resolve<F, Fut, E>(&self, key: &str, resolver: F) -> u32
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u32, E>>,
        E: Display,
    {
        if let Some(value) = self.get(key) {
            return value;
        }

        let cell = {
            let mut in_flight = self.in_flight.lock();
            // re-check under the lock: a finishing attempt promotes its value
            // before it leaves the in-flight table
            if let Some(value) = self.get(key) {
                return value;
            }
            Arc::clone(
                in_flight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let attempt = *cell
            .get_or_init(|| async {
                self.resolutions.fetch_add(1, Ordering::SeqCst);
                match resolver().await {
                    Ok(value) => Attempt {
                        value,
                        resolved: true,
                    },
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "lookup failed; using default");
                        Attempt {
                            value: self.default,
                            resolved: false,
                        }
                    }
                }
            })
            .await;

        let mut in_flight = self.in_flight.lock();
        if attempt.resolved {
            self.completed.write().insert(key.to_string(), attempt.value);
        }
        if in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            in_flight.remove(key);
        }

        attempt.value
    }

    /// Peek at the completed table.
    pub fn get(&self, key: &str) -> Option<u32> {
        self.completed.read().get(key).copied()
    }

    /// Number of completed entries.
    pub fn len(&self) -> usize {
        self.completed.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.read().is_empty()
    }

    /// How many times a resolver has actually run.
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}
