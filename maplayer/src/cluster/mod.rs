//! Per-surface marker clustering.
//!
//! The [`ClusterCoordinator`] is bound to exactly one surface at creation
//! and cannot be rebound. Every [`ClusterCoordinator::cluster`] call
//! atomically replaces the entire placed-item set: clear-then-add, never an
//! incremental diff. Partial updates risk orphaned visual artifacts when
//! marker identity churns quickly; full replacement trades a little
//! efficiency for correctness.
//!
//! Grouping is non-hierarchical and distance-based: the viewport is divided
//! into a grid and each occupied cell either collapses into one
//! [`ClusterBadge`] or yields direct single placements, depending on the
//! configured minimum cluster size.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::ClusterConfig;
use crate::geo::{GeoBounds, LatLng};
use crate::icon::{ClusterIconTable, IconImage};
use crate::marker::{Marker, MarkerId};
use crate::surface::{RenderSurface, SurfaceId};

/// A rendered cluster of markers: position, member count and badge icon.
///
/// The label carries the literal member count; rasterizing it over the icon
/// is the render surface's concern.
#[derive(Debug, Clone)]
pub struct ClusterBadge {
    /// Centroid of the member positions.
    pub position: LatLng,
    /// Members folded into this badge, in ascending id order.
    pub members: Vec<MarkerId>,
    /// Literal count text to overlay on the icon.
    pub label: String,
    /// Badge base image from the surface's icon table, if any resolved.
    pub icon: Option<Arc<IconImage>>,
}

impl ClusterBadge {
    /// Number of members in the cluster.
    pub fn count(&self) -> usize {
        self.members.len()
    }
}

/// One placed item after a clustering pass.
#[derive(Debug, Clone)]
enum Placement {
    /// A marker placed directly, below the cluster threshold.
    Single(MarkerId),
    /// A collapsed group of markers.
    Cluster(ClusterBadge),
}

/// Clustering engine bound to one surface.
#[derive(Debug)]
pub struct ClusterCoordinator {
    surface: SurfaceId,
    config: ClusterConfig,
    placements: Vec<Placement>,
}

impl ClusterCoordinator {
    /// Create a coordinator for a surface.
    pub fn new(surface: SurfaceId, config: ClusterConfig) -> Self {
        Self {
            surface,
            config,
            placements: Vec::new(),
        }
    }

    /// The surface this coordinator is bound to.
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Replace the entire placed-item set with groupings of `markers`.
    ///
    /// Previous placements are removed from the render surface first, then
    /// the new set is attached. Returns the ids placed as singles so the
    /// caller can record their attachment.
    pub fn cluster(
        &mut self,
        markers: &[&Marker],
        bounds: &GeoBounds,
        icons: &ClusterIconTable,
        render: &mut dyn RenderSurface,
    ) -> Vec<MarkerId> {
        self.clear_placements(render);

        let placements = build_placements(markers, bounds, &self.config, icons);
        let mut singles = Vec::new();

        for placement in &placements {
            match placement {
                Placement::Single(id) => {
                    if let Some(marker) = markers.iter().find(|m| m.id() == *id) {
                        render.attach(marker);
                        singles.push(*id);
                    }
                }
                Placement::Cluster(badge) => render.attach_cluster(badge),
            }
        }

        debug!(
            surface = %self.surface,
            markers = markers.len(),
            placements = placements.len(),
            singles = singles.len(),
            "cluster pass complete"
        );

        self.placements = placements;
        singles
    }

    /// Remove every placed item and leave the coordinator empty.
    ///
    /// Called when clustering is disabled for the surface; the caller drops
    /// the coordinator afterwards and falls back to direct placement.
    pub fn disable(&mut self, render: &mut dyn RenderSurface) {
        self.clear_placements(render);
    }

    /// Ids of markers currently placed as singles.
    pub fn placed_singles(&self) -> Vec<MarkerId> {
        self.placements
            .iter()
            .filter_map(|p| match p {
                Placement::Single(id) => Some(*id),
                Placement::Cluster(_) => None,
            })
            .collect()
    }

    /// Badges currently placed.
    pub fn placed_badges(&self) -> Vec<&ClusterBadge> {
        self.placements
            .iter()
            .filter_map(|p| match p {
                Placement::Cluster(badge) => Some(badge),
                Placement::Single(_) => None,
            })
            .collect()
    }

    fn clear_placements(&mut self, render: &mut dyn RenderSurface) {
        for placement in self.placements.drain(..) {
            if let Placement::Single(id) = placement {
                render.detach(id);
            }
        }
        render.clear_clusters();
    }
}

/// Group markers into grid cells and fold dense cells into badges.
///
/// Deterministic for a given input: members are sorted by id and the badge
/// position is the member centroid. A degenerate viewport (zero span)
/// collapses everything into one cell.
fn build_placements(
    markers: &[&Marker],
    bounds: &GeoBounds,
    config: &ClusterConfig,
    icons: &ClusterIconTable,
) -> Vec<Placement> {
    let cell_lat = bounds.lat_span() * config.cell_fraction;
    let cell_lng = bounds.lng_span() * config.cell_fraction;

    let mut cells: HashMap<(i64, i64), Vec<&Marker>> = HashMap::new();
    for marker in markers {
        let row = if cell_lat > 0.0 {
            ((marker.position.lat - bounds.south) / cell_lat).floor() as i64
        } else {
            0
        };
        let col = if cell_lng > 0.0 {
            ((marker.position.lng - bounds.west).rem_euclid(360.0) / cell_lng).floor() as i64
        } else {
            0
        };
        cells.entry((row, col)).or_default().push(marker);
    }

    let mut placements = Vec::new();
    let mut keys: Vec<(i64, i64)> = cells.keys().copied().collect();
    keys.sort_unstable();

    for key in keys {
        let mut members = cells.remove(&key).unwrap_or_default();
        members.sort_by_key(|m| m.id());

        if members.len() >= config.min_cluster_size {
            let count = members.len();
            let lat = members.iter().map(|m| m.position.lat).sum::<f64>() / count as f64;
            let lng = members.iter().map(|m| m.position.lng).sum::<f64>() / count as f64;

            placements.push(Placement::Cluster(ClusterBadge {
                position: LatLng::new(lat, lng),
                members: members.iter().map(|m| m.id()).collect(),
                label: count.to_string(),
                icon: icons.icon_for_count(count as u32).cloned(),
            }));
        } else {
            placements.extend(members.iter().map(|m| Placement::Single(m.id())));
        }
    }

    placements
}
