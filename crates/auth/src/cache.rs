//! Read-through cache of role grants, keyed by role id.
//!
//! Entries are immutable snapshots. Every grant mutation must call
//! [`PermissionCache::invalidate`]; the TTL only bounds staleness for edits
//! made behind the service's back (e.g. directly in the database).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use labtrack_core::RoleId;

use crate::RoleGrants;

#[derive(Debug, Clone)]
struct CachedGrants {
    grants: Arc<RoleGrants>,
    loaded_at: Instant,
}

#[derive(Debug)]
pub struct PermissionCache {
    ttl: Duration,
    entries: RwLock<HashMap<RoleId, CachedGrants>>,
    // Bumped on every invalidation; loads that started before a bump are
    // discarded instead of cached.
    generation: AtomicU64,
}

impl PermissionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn get(&self, role_id: RoleId) -> Option<Arc<RoleGrants>> {
        let map = self.entries.read().ok()?;
        let entry = map.get(&role_id)?;
        if entry.loaded_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.grants.clone())
    }

    /// Snapshot of the generation, taken before reading the store.
    pub fn begin_load(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cache `grants` unless an invalidation happened since `generation`.
    pub fn insert(&self, grants: Arc<RoleGrants>, generation: u64) {
        if let Ok(mut map) = self.entries.write() {
            // Checked under the write lock so it cannot interleave with invalidate().
            if self.generation.load(Ordering::Acquire) != generation {
                return;
            }
            map.insert(
                grants.role_id,
                CachedGrants {
                    grants,
                    loaded_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, role_id: RoleId) {
        if let Ok(mut map) = self.entries.write() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            map.remove(&role_id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PermissionSet, RoleName, permissions};

    fn grants(role_id: RoleId) -> Arc<RoleGrants> {
        Arc::new(RoleGrants {
            role_id,
            role_name: RoleName::USER,
            permissions: PermissionSet::from([permissions::READ_INTERFACES]),
        })
    }

    #[test]
    fn insert_then_get() {
        let cache = PermissionCache::new(Duration::from_secs(60));
        let role_id = RoleId::new();
        let generation = cache.begin_load();
        cache.insert(grants(role_id), generation);
        assert_eq!(cache.get(role_id).unwrap().role_id, role_id);
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = PermissionCache::new(Duration::from_secs(60));
        let role_id = RoleId::new();
        cache.insert(grants(role_id), cache.begin_load());
        cache.invalidate(role_id);
        assert!(cache.get(role_id).is_none());
    }

    #[test]
    fn load_racing_an_invalidation_is_not_cached() {
        let cache = PermissionCache::new(Duration::from_secs(60));
        let role_id = RoleId::new();
        let generation = cache.begin_load();
        cache.invalidate(role_id);
        cache.insert(grants(role_id), generation);
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_ttl_never_serves() {
        let cache = PermissionCache::new(Duration::ZERO);
        let role_id = RoleId::new();
        cache.insert(grants(role_id), cache.begin_load());
        assert!(cache.get(role_id).is_none());
    }
}
