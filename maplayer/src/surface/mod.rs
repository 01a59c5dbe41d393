//! Map surfaces and their registry.
//!
//! A [`MapSurface`] is one native map instance composited with the host
//! document. The core never draws anything itself; all rendering goes
//! through the injected [`RenderSurface`] handle, which keeps the engine
//! testable with an in-memory fake.
//!
//! The [`SurfaceRegistry`] owns every live surface. It is created when the
//! engine starts and dropped on teardown; components receive it by
//! reference rather than reaching for ambient state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cluster::{ClusterBadge, ClusterCoordinator};
use crate::geo::{GeoBounds, ScreenPoint, ScreenRect};
use crate::icon::ClusterIconTable;
use crate::marker::{Marker, MarkerId};

/// Global counter minting process-unique surface ids.
static SURFACE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a map surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// Mint the next unique id.
    pub fn next() -> Self {
        Self(SURFACE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// Opaque reference to a hit-testable element inside a native surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// Rendering operations the core requires from a native map surface.
///
/// Implemented by the platform layer; tests use an in-memory fake that
/// records attachments. All calls happen on the engine's owner task.
pub trait RenderSurface: Send + 'static {
    /// Place a marker on the surface.
    fn attach(&mut self, marker: &Marker);

    /// Remove a marker from the surface, if present.
    fn detach(&mut self, marker: MarkerId);

    /// Place a cluster badge on the surface.
    fn attach_cluster(&mut self, badge: &ClusterBadge);

    /// Remove every cluster badge from the surface.
    fn clear_clusters(&mut self);

    /// Hit test a point in the surface's local coordinate space.
    fn hit_test(&self, point: ScreenPoint) -> Option<ElementId>;

    /// The camera's current visible region.
    fn viewport_bounds(&self) -> GeoBounds;

    /// Translate a document-space point into the surface's local space.
    fn localize(&self, point: ScreenPoint) -> ScreenPoint;
}

/// Creation-time options for a surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceOptions {
    /// Whether markers on this surface are clustered.
    pub clustering_enabled: bool,

    /// Whether markers on this surface are tracked in the marker cache.
    pub caching_enabled: bool,

    /// Initial touch hole regions, in document coordinates.
    pub touch_regions: Vec<ScreenRect>,
}

/// One native map instance and its per-surface overlay state.
pub struct MapSurface {
    id: SurfaceId,
    pub(crate) render: Box<dyn RenderSurface>,
    pub(crate) clustering_enabled: bool,
    pub(crate) caching_enabled: bool,
    pub(crate) enabled: bool,
    pub(crate) touch_regions: Vec<ScreenRect>,
    pub(crate) coordinator: Option<ClusterCoordinator>,
    pub(crate) icon_table: ClusterIconTable,
}

impl MapSurface {
    /// Create a surface around a render handle.
    ///
    /// The clustering coordinator is created here iff the options enable
    /// clustering, keeping the coordinator-exists-iff-enabled invariant from
    /// the first moment of the surface's life.
    pub fn new(render: Box<dyn RenderSurface>, options: SurfaceOptions, cluster: crate::config::ClusterConfig) -> Self {
        let id = SurfaceId::next();
        let coordinator = options
            .clustering_enabled
            .then(|| ClusterCoordinator::new(id, cluster));

        Self {
            id,
            render,
            clustering_enabled: options.clustering_enabled,
            caching_enabled: options.caching_enabled,
            enabled: true,
            touch_regions: options.touch_regions,
            coordinator,
            icon_table: ClusterIconTable::default(),
        }
    }

    /// The surface's id.
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Whether the surface currently accepts user interaction.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether clustering is enabled for this surface.
    pub fn clustering_enabled(&self) -> bool {
        self.clustering_enabled
    }

    /// Whether marker caching is enabled for this surface.
    pub fn caching_enabled(&self) -> bool {
        self.caching_enabled
    }

    /// The surface's hole regions.
    pub fn touch_regions(&self) -> &[ScreenRect] {
        &self.touch_regions
    }
}

impl std::fmt::Debug for MapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSurface")
            .field("id", &self.id)
            .field("clustering_enabled", &self.clustering_enabled)
            .field("caching_enabled", &self.caching_enabled)
            .field("enabled", &self.enabled)
            .field("touch_regions", &self.touch_regions.len())
            .finish()
    }
}

/// Registry of live map surfaces.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    surfaces: HashMap<SurfaceId, MapSurface>,
}

impl SurfaceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a surface, returning its id.
    pub fn insert(&mut self, surface: MapSurface) -> SurfaceId {
        let id = surface.id();
        self.surfaces.insert(id, surface);
        id
    }

    /// Look up a surface by id.
    pub fn get(&self, id: SurfaceId) -> Option<&MapSurface> {
        self.surfaces.get(&id)
    }

    /// Look up a surface mutably by id.
    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut MapSurface> {
        self.surfaces.get_mut(&id)
    }

    /// Remove a surface, returning it if present.
    pub fn remove(&mut self, id: SurfaceId) -> Option<MapSurface> {
        self.surfaces.remove(&id)
    }

    /// Whether a surface id is live.
    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    /// Iterate over live surfaces.
    pub fn iter(&self) -> impl Iterator<Item = &MapSurface> {
        self.surfaces.values()
    }

    /// Iterate mutably over live surfaces.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MapSurface> {
        self.surfaces.values_mut()
    }

    /// Number of live surfaces.
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}
