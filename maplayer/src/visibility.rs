//! Camera-change marker presentation.
//!
//! Recomputes which markers a surface shows whenever the camera moves, a
//! re-cluster is requested, or a caching toggle changes the candidate set.
//! The whole pass runs synchronously on the engine's owner task, so outside
//! observers never see the intermediate detached state.

use tracing::{debug, trace};

use crate::geo::GeoBounds;
use crate::marker::{MarkerCache, MarkerId, MarkerRegistry};
use crate::surface::{SurfaceId, SurfaceRegistry};

/// Re-evaluate marker presentation for one surface.
///
/// The steps form a single logical transaction:
///
/// 1. Candidates come from the marker cache when caching is enabled for the
///    surface, otherwise from the full live registry.
/// 2. Every candidate is detached from whatever surface currently owns it;
///    its previous placement may be wrong for the new camera state. A
///    candidate whose owning surface has been torn down just has the stale
///    reference cleared.
/// 3. When per-camera-change presentation applies (it follows the caching
///    flag), candidates outside `bounds` are dropped.
/// 4. The survivors go to the clustering coordinator when one exists,
///    otherwise each is attached directly.
pub fn present(
    surfaces: &mut SurfaceRegistry,
    markers: &mut MarkerRegistry,
    cache: &MarkerCache,
    surface_id: SurfaceId,
    bounds: GeoBounds,
) {
    if !surfaces.contains(surface_id) {
        return;
    }

    // Step 1: candidate set.
    let use_cache = surfaces
        .get(surface_id)
        .map(|s| s.caching_enabled && cache.is_enabled())
        .unwrap_or(false);
    let mut candidates: Vec<MarkerId> = if use_cache {
        cache.markers_for(surface_id).into_iter().collect()
    } else {
        markers.ids()
    };
    candidates.sort_unstable();

    // Step 2: detach every candidate from its current owner.
    for id in &candidates {
        let owner = match markers.get_mut(*id) {
            Some(marker) => marker.surface.take(),
            None => continue,
        };
        if let Some(owner_id) = owner {
            match surfaces.get_mut(owner_id) {
                Some(owner_surface) => owner_surface.render.detach(*id),
                None => trace!(marker = %id, surface = %owner_id, "cleared stale surface reference"),
            }
        }
    }

    // Step 3: viewport filter. Presenting per camera change mirrors the
    // caching flag; with caching off, every candidate stays.
    let visible: Vec<MarkerId> = if use_cache {
        candidates
            .into_iter()
            .filter(|id| {
                markers
                    .get(*id)
                    .map(|m| bounds.contains(m.position))
                    .unwrap_or(false)
            })
            .collect()
    } else {
        candidates
    };

    // Step 4: cluster or attach directly.
    let surface = match surfaces.get_mut(surface_id) {
        Some(surface) => surface,
        None => return,
    };

    match surface.coordinator.as_mut() {
        Some(coordinator) => {
            let refs: Vec<&crate::marker::Marker> =
                visible.iter().filter_map(|id| markers.get(*id)).collect();
            let singles =
                coordinator.cluster(&refs, &bounds, &surface.icon_table, surface.render.as_mut());
            for id in singles {
                if let Some(marker) = markers.get_mut(id) {
                    marker.surface = Some(surface_id);
                }
            }
        }
        None => {
            for id in &visible {
                if let Some(marker) = markers.get_mut(*id) {
                    surface.render.attach(marker);
                    marker.surface = Some(surface_id);
                }
            }
        }
    }

    debug!(surface = %surface_id, bounds = %bounds, visible = visible.len(), "presentation pass complete");
}
