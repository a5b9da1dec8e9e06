//! Fixed-inventory proxy pool with atomic reservation.
//!
//! The pool never grows: it is the configured list of proxy records, plus an
//! `in_use` index set. A worker holds one lease for the lifetime of a browser
//! session and swaps it on every rotation. When every proxy is taken the pool
//! degrades to handing out the next index round-robin as a shared
//! (non-exclusive) lease rather than blocking the worker.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// One proxy endpoint, with optional Basic credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRecord {
    /// `host:port`, scheme-less.
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyRecord {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: None,
            password: None,
        }
    }

    #[must_use]
    pub fn with_credentials(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Credential-free label safe for logs and audit entries.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// A held proxy reservation. `exclusive` is false only on the degraded
/// every-proxy-taken path, where the index stays attributed to its original
/// holder in `in_use`.
#[derive(Debug, Clone)]
pub struct ProxyLease {
    pub index: usize,
    pub exclusive: bool,
}

#[derive(Debug, Default)]
struct PoolState {
    in_use: HashSet<usize>,
    cursor: usize,
}

/// Shared pool over the configured proxy list.
pub struct ProxyPool {
    records: Vec<ProxyRecord>,
    state: Mutex<PoolState>,
}

impl ProxyPool {
    #[must_use]
    pub fn new(records: Vec<ProxyRecord>) -> Arc<Self> {
        Arc::new(Self {
            records,
            state: Mutex::new(PoolState::default()),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn record(&self, index: usize) -> &ProxyRecord {
        &self.records[index % self.records.len()]
    }

    /// Number of exclusively held proxies.
    #[must_use]
    pub fn in_use_count(&self) -> usize {
        self.state.lock().in_use.len()
    }

    /// Reserve a proxy, preferring free indices outside `exclude`, then any
    /// free index, then (all taken) the next index round-robin as a shared
    /// lease.
    #[must_use]
    pub fn acquire(&self, exclude: &HashSet<usize>) -> ProxyLease {
        let mut state = self.state.lock();
        let n = self.records.len();

        let free_outside = (0..n).find(|i| !state.in_use.contains(i) && !exclude.contains(i));
        let free_any = free_outside.or_else(|| (0..n).find(|i| !state.in_use.contains(i)));

        if let Some(index) = free_any {
            state.in_use.insert(index);
            return ProxyLease {
                index,
                exclusive: true,
            };
        }

        let index = state.cursor % n;
        state.cursor = state.cursor.wrapping_add(1);
        warn!(index, "proxy pool exhausted, sharing an in-use index");
        ProxyLease {
            index,
            exclusive: false,
        }
    }

    /// Release a lease. Shared leases leave `in_use` untouched: the index
    /// still belongs to its exclusive holder.
    pub fn release(&self, lease: &ProxyLease) {
        if lease.exclusive {
            self.state.lock().in_use.remove(&lease.index);
        }
    }

    /// Release `current` and reserve a different proxy, preferring one that
    /// is neither in use nor the one just abandoned.
    #[must_use]
    pub fn rotate(&self, current: &ProxyLease) -> ProxyLease {
        self.release(current);
        let mut exclude = HashSet::new();
        exclude.insert(current.index);
        self.acquire(&exclude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> Arc<ProxyPool> {
        ProxyPool::new((0..n).map(|i| ProxyRecord::new(format!("10.0.0.{i}:8080"))).collect())
    }

    #[test]
    fn acquire_prefers_unexcluded_free_indices() {
        let pool = pool(3);
        let mut exclude = HashSet::new();
        exclude.insert(0);
        let lease = pool.acquire(&exclude);
        assert_ne!(lease.index, 0);
        assert!(lease.exclusive);
    }

    #[test]
    fn exclusion_degrades_to_full_pool() {
        let pool = pool(2);
        let exclude: HashSet<usize> = [0, 1].into_iter().collect();
        let lease = pool.acquire(&exclude);
        assert!(lease.exclusive, "free index still granted despite exclusion");
    }

    #[test]
    fn exhausted_pool_hands_out_shared_leases() {
        let pool = pool(2);
        let a = pool.acquire(&HashSet::new());
        let b = pool.acquire(&HashSet::new());
        assert_eq!(pool.in_use_count(), 2);

        let c = pool.acquire(&HashSet::new());
        assert!(!c.exclusive);
        assert_eq!(pool.in_use_count(), 2, "shared lease not double-counted");

        pool.release(&c);
        assert_eq!(pool.in_use_count(), 2, "shared release leaves owner's hold");
        pool.release(&a);
        pool.release(&b);
        assert_eq!(pool.in_use_count(), 0);
    }

    #[test]
    fn rotate_avoids_the_abandoned_index() {
        let pool = pool(3);
        let lease = pool.acquire(&HashSet::new());
        let next = pool.rotate(&lease);
        assert_ne!(next.index, lease.index);
        assert_eq!(pool.in_use_count(), 1);
    }

    #[test]
    fn rotate_on_single_proxy_pool_reuses_it() {
        let pool = pool(1);
        let lease = pool.acquire(&HashSet::new());
        let next = pool.rotate(&lease);
        assert_eq!(next.index, 0);
        assert!(next.exclusive);
    }
}
