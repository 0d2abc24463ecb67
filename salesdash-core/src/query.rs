//! Keyed query cache with in-flight request sharing.
//!
//! Each key maps to one slot: a pending shared future, a settled value, or a
//! recorded failure. Callers asking for a key that is already pending attach
//! to the same future instead of issuing another request. Failures are kept
//! for `state()` but never served from `fetch()`; the next fetch re-requests.
//! A pending request whose callers have all gone away is dropped from the
//! cache rather than reported as loading.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::ApiError;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;

enum Slot<V> {
    Pending {
        id: u64,
        fut: SharedFetch<V>,
        /// Last settled value, still shown while a refetch runs.
        previous: Option<V>,
        /// Callers currently awaiting `fut`.
        waiters: usize,
    },
    Ready {
        value: V,
        fetched_at: Instant,
    },
    Failed {
        error: ApiError,
        previous: Option<V>,
    },
}

enum Plan<V> {
    Hit(V),
    Await(u64, SharedFetch<V>),
}

/// Snapshot of one query, as a view would render it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<V> {
    pub data: Option<V>,
    pub is_loading: bool,
    pub error: Option<ApiError>,
}

impl<V> Default for QueryState<V> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

pub struct QueryCache<K, V> {
    name: &'static str,
    stale_after: Option<Duration>,
    slots: Mutex<HashMap<K, Slot<V>>>,
    next_id: AtomicU64,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, stale_after: Option<Duration>) -> Self {
        Self {
            name,
            stale_after,
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        // Slots hold no invariants a panicking holder could break halfway.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_fresh(&self, fetched_at: Instant) -> bool {
        self.stale_after
            .map_or(true, |ttl| fetched_at.elapsed() < ttl)
    }

    /// Resolve `key`: a fresh cached value, the pending request for it, or a
    /// new request built by `fetcher` (called at most once per miss).
    pub async fn fetch<F, Fut>(&self, key: K, fetcher: F) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let plan = {
            let mut slots = self.lock();
            match slots.remove(&key) {
                Some(Slot::Ready { value, fetched_at }) if self.is_fresh(fetched_at) => {
                    tracing::debug!(query = self.name, key = ?key, "cache hit");
                    let hit = value.clone();
                    slots.insert(key.clone(), Slot::Ready { value, fetched_at });
                    Plan::Hit(hit)
                }
                Some(Slot::Pending {
                    id,
                    fut,
                    previous,
                    waiters,
                }) => {
                    tracing::debug!(query = self.name, key = ?key, "joining in-flight request");
                    let joined = fut.clone();
                    slots.insert(
                        key.clone(),
                        Slot::Pending {
                            id,
                            fut,
                            previous,
                            waiters: waiters + 1,
                        },
                    );
                    Plan::Await(id, joined)
                }
                other => {
                    let previous = match other {
                        Some(Slot::Ready { value, .. }) => Some(value),
                        Some(Slot::Failed { previous, .. }) => previous,
                        _ => None,
                    };
                    tracing::debug!(query = self.name, key = ?key, "cache miss; fetching");
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let fut = fetcher().boxed().shared();
                    slots.insert(
                        key.clone(),
                        Slot::Pending {
                            id,
                            fut: fut.clone(),
                            previous,
                            waiters: 1,
                        },
                    );
                    Plan::Await(id, fut)
                }
            }
        };

        match plan {
            Plan::Hit(value) => Ok(value),
            Plan::Await(id, fut) => {
                let mut waiter = Waiter {
                    cache: self,
                    key: Some(key),
                    id,
                };
                let result = fut.await;
                if let Some(key) = waiter.key.take() {
                    self.settle(key, id, &result);
                }
                result
            }
        }
    }

    /// Record the outcome of request `id`, unless its slot was invalidated or
    /// replaced in the meantime.
    fn settle(&self, key: K, id: u64, result: &Result<V, ApiError>) {
        let mut slots = self.lock();
        let owns_slot = matches!(slots.get(&key), Some(Slot::Pending { id: current, .. }) if *current == id);
        if owns_slot {
            let previous = match slots.remove(&key) {
                Some(Slot::Pending { previous, .. }) => previous,
                _ => None,
            };
            let slot = match result {
                Ok(value) => Slot::Ready {
                    value: value.clone(),
                    fetched_at: Instant::now(),
                },
                Err(error) => {
                    tracing::warn!(query = self.name, key = ?key, error = %error, "query failed");
                    Slot::Failed {
                        error: error.clone(),
                        previous,
                    }
                }
            };
            slots.insert(key, slot);
        }
    }

    /// A waiter on request `id` went away before it settled. The last one out
    /// removes the slot so it does not report a request nobody is driving.
    fn abandon(&self, key: &K, id: u64) {
        let mut slots = self.lock();
        let orphaned = match slots.get_mut(key) {
            Some(Slot::Pending {
                id: current,
                waiters,
                ..
            }) if *current == id => {
                *waiters = waiters.saturating_sub(1);
                *waiters == 0
            }
            _ => false,
        };
        if orphaned {
            slots.remove(key);
            tracing::debug!(query = self.name, key = ?key, "in-flight request abandoned");
        }
    }

    /// What a view bound to `key` would show right now.
    pub fn state(&self, key: &K) -> QueryState<V> {
        match self.lock().get(key) {
            None => QueryState::default(),
            Some(Slot::Pending { previous, .. }) => QueryState {
                data: previous.clone(),
                is_loading: true,
                error: None,
            },
            Some(Slot::Ready { value, .. }) => QueryState {
                data: Some(value.clone()),
                is_loading: false,
                error: None,
            },
            Some(Slot::Failed { error, previous }) => QueryState {
                data: previous.clone(),
                is_loading: false,
                error: Some(error.clone()),
            },
        }
    }

    /// Drop one entry. A request still in flight for it will not repopulate it.
    pub fn invalidate(&self, key: &K) {
        if self.lock().remove(key).is_some() {
            tracing::debug!(query = self.name, key = ?key, "invalidated");
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// One caller awaiting a pending slot. Dropped unsettled, it releases its
/// claim on the slot.
struct Waiter<'a, K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    cache: &'a QueryCache<K, V>,
    key: Option<K>,
    id: u64,
}

impl<K, V> Drop for Waiter<'_, K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.cache.abandon(&key, self.id);
        }
    }
}
