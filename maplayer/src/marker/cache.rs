//! Per-surface marker membership cache.
//!
//! The cache records which markers belong to which surface, independently of
//! whether they are currently attached to the surface's renderer. The
//! visibility filter reads it on every camera change to decide the candidate
//! set, so membership must survive detach/re-attach churn.
//!
//! Membership has set semantics: duplicate inserts are idempotent, removes
//! of absent entries are no-ops, and there is no ordering among the markers
//! of one surface.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::marker::MarkerId;
use crate::surface::SurfaceId;

/// Per-surface marker membership, with a global enable switch.
///
/// While disabled, `add` is a no-op and every read returns empty; disabling
/// drops all entries for all surfaces atomically.
#[derive(Debug)]
pub struct MarkerCache {
    entries: HashMap<SurfaceId, HashSet<MarkerId>>,
    enabled: bool,
}

impl Default for MarkerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerCache {
    /// Create an enabled, empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            enabled: true,
        }
    }

    /// Whether caching is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Insert a marker into a surface's set.
    ///
    /// Idempotent; a no-op while caching is disabled.
    pub fn add(&mut self, marker: MarkerId, surface: SurfaceId) {
        if !self.enabled {
            return;
        }
        self.entries.entry(surface).or_default().insert(marker);
    }

    /// Remove a marker from a surface's set, if present.
    pub fn remove(&mut self, marker: MarkerId, surface: SurfaceId) {
        if let Some(set) = self.entries.get_mut(&surface) {
            set.remove(&marker);
        }
    }

    /// Remove a marker from whichever surface holds it.
    ///
    /// The caller's idea of the marker's surface may be stale at removal
    /// time, so every surface is scanned.
    pub fn remove_by_identity(&mut self, marker: MarkerId) {
        for set in self.entries.values_mut() {
            set.remove(&marker);
        }
    }

    /// Snapshot of a surface's current marker set.
    pub fn markers_for(&self, surface: SurfaceId) -> HashSet<MarkerId> {
        self.entries.get(&surface).cloned().unwrap_or_default()
    }

    /// Drop all entries for one surface.
    pub fn clear(&mut self, surface: SurfaceId) {
        self.entries.remove(&surface);
    }

    /// Drop all entries for all surfaces and disable further inserts.
    pub fn disable_caching(&mut self) {
        debug!("marker caching disabled, dropping all entries");
        self.enabled = false;
        self.entries.clear();
    }

    /// Re-enable inserts after [`MarkerCache::disable_caching`].
    pub fn enable_caching(&mut self) {
        self.enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sid(raw: u64) -> SurfaceId {
        SurfaceId::from_raw(raw)
    }

    fn mid(raw: u64) -> MarkerId {
        MarkerId::from_raw(raw)
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut cache = MarkerCache::new();
        cache.add(mid(1), sid(1));
        cache.add(mid(1), sid(1));
        assert_eq!(cache.markers_for(sid(1)).len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut cache = MarkerCache::new();
        cache.remove(mid(1), sid(1));
        cache.add(mid(2), sid(1));
        cache.remove(mid(1), sid(1));
        assert_eq!(cache.markers_for(sid(1)).len(), 1);
    }

    #[test]
    fn test_remove_by_identity_scans_all_surfaces() {
        let mut cache = MarkerCache::new();
        cache.add(mid(1), sid(1));
        cache.add(mid(2), sid(2));

        // The caller believes the marker is on surface 1; it is on surface 2.
        cache.remove_by_identity(mid(2));
        assert!(cache.markers_for(sid(2)).is_empty());
        assert_eq!(cache.markers_for(sid(1)).len(), 1);
    }

    #[test]
    fn test_clear_drops_one_surface() {
        let mut cache = MarkerCache::new();
        cache.add(mid(1), sid(1));
        cache.add(mid(2), sid(2));
        cache.clear(sid(1));
        assert!(cache.markers_for(sid(1)).is_empty());
        assert_eq!(cache.markers_for(sid(2)).len(), 1);
    }

    #[test]
    fn test_disable_caching_clears_and_blocks_adds() {
        let mut cache = MarkerCache::new();
        cache.add(mid(1), sid(1));

        cache.disable_caching();
        assert!(cache.markers_for(sid(1)).is_empty());

        // Subsequent adds are no-ops until re-enabled.
        cache.add(mid(2), sid(1));
        assert!(cache.markers_for(sid(1)).is_empty());

        cache.enable_caching();
        cache.add(mid(2), sid(1));
        assert_eq!(cache.markers_for(sid(1)).len(), 1);
    }

    proptest! {
        /// For any interleaving of add/remove on one surface, the resulting
        /// set equals the set of added ids minus the ids removed after their
        /// last add.
        #[test]
        fn prop_set_semantics(ops in prop::collection::vec((any::<bool>(), 0u64..16), 0..64)) {
            let mut cache = MarkerCache::new();
            let mut model: HashSet<u64> = HashSet::new();
            let surface = sid(1);

            for (is_add, raw) in ops {
                if is_add {
                    cache.add(mid(raw), surface);
                    model.insert(raw);
                } else {
                    cache.remove(mid(raw), surface);
                    model.remove(&raw);
                }
            }

            let got: HashSet<u64> = cache
                .markers_for(surface)
                .into_iter()
                .map(|id| id.raw())
                .collect();
            prop_assert_eq!(got, model);
        }
    }
}
