//! Per-process memoization of flattened role permissions
//!
//! Each entry carries the [`StoreStamp`] observed when it was built and is
//! served only while that stamp still matches the store, so a write by this
//! process (generation bump) or by another process (mtime advance) makes
//! the entry lazily refresh on the next read. There is no push-based
//! invalidation channel; staleness is bounded by the stamp check.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::store::StoreStamp;
use crate::types::GroupId;

/// One flattened grant: a pattern and the group that contributed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSource {
    pub pattern: String,
    pub value: bool,
    pub group_id: GroupId,
    pub weight: i64,
}

/// Everything the engine needs to resolve nodes for one role
#[derive(Clone)]
pub struct RolePermissions {
    pub chain: Arc<[GroupId]>,
    pub sources: Arc<[PermissionSource]>,
}

struct CacheEntry {
    stamp: StoreStamp,
    perms: RolePermissions,
}

/// Statistics about cache performance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses (including stale entries)
    pub misses: usize,
    /// Number of entries currently cached
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe role -> flattened-permissions cache
#[derive(Default)]
pub struct RolePermissionCache {
    entries: DashMap<String, CacheEntry>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl RolePermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached permissions for `role` if still valid at `stamp`
    pub fn get(&self, role: &str, stamp: StoreStamp) -> Option<RolePermissions> {
        if let Some(entry) = self.entries.get(role) {
            if entry.stamp == stamp {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.perms.clone());
            }
            drop(entry);
            self.entries.remove(role);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store freshly computed permissions for `role` as of `stamp`
    pub fn put(&self, role: &str, stamp: StoreStamp, perms: RolePermissions) {
        self.entries
            .insert(role.to_string(), CacheEntry { stamp, perms });
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
