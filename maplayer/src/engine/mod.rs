//! Single-writer engine owning all mutable overlay state.
//!
//! The underlying rendering surfaces are not safe for concurrent mutation,
//! so one long-running task owns the surface registry, marker registry,
//! marker cache and per-surface clustering coordinators. Public operations
//! are commands sent over a bounded channel; each carries a `oneshot`
//! responder.
//!
//! ```text
//! EngineHandle ──► Command ──► ┌──────────────────────────────┐
//!    (clone freely)            │          MapEngine           │
//!                              │                              │
//!                              │  SurfaceRegistry             │
//!                              │  MarkerRegistry  MarkerCache │
//!                              │  ClusterCoordinators         │
//!                              └──────────┬───────────────────┘
//!                                         │ spawn
//!                                         ▼
//!                              icon resolution (async I/O)
//!                                         │ self-send
//!                                         ▼
//!                              MarkerIconResolved / InstallIconTable
//! ```
//!
//! Icon resolution is the only operation that leaves the owner task; its
//! completions are marshaled back through the same command channel, so
//! shared state is still only ever touched in one place. A completion whose
//! marker or surface has since been removed is dropped silently; the
//! clear-then-add clustering semantics already guarantee that only the most
//! recent state persists.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cluster::ClusterCoordinator;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::geo::{GeoBounds, LatLng, ScreenPoint, ScreenRect};
use crate::icon::{
    resolve_batch, ClusterIconTable, HttpIconResolver, IconError, IconImage, IconResolver,
};
use crate::marker::{Marker, MarkerCache, MarkerId, MarkerPreferences, MarkerRegistry};
use crate::surface::{MapSurface, RenderSurface, SurfaceId, SurfaceOptions, SurfaceRegistry};
use crate::telemetry::{EngineMetrics, TelemetrySnapshot};
use crate::touch::{self, DocumentProbe, TouchTarget};
use crate::visibility;

// =============================================================================
// Commands
// =============================================================================

/// Commands processed by the engine's owner task.
enum Command {
    CreateSurface {
        render: Box<dyn RenderSurface>,
        options: SurfaceOptions,
        reply: oneshot::Sender<SurfaceId>,
    },
    RemoveSurface {
        surface: SurfaceId,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    CreateMarker {
        surface: SurfaceId,
        position: LatLng,
        preferences: MarkerPreferences,
        reply: oneshot::Sender<Result<MarkerId, EngineError>>,
    },
    CreateMarkers {
        surface: SurfaceId,
        batch: Vec<(LatLng, MarkerPreferences)>,
        reply: oneshot::Sender<Result<Vec<MarkerId>, EngineError>>,
    },
    RemoveMarker {
        marker: MarkerId,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    SetClusteringEnabled {
        surface: SurfaceId,
        enabled: bool,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    SetCachingEnabled {
        surface: SurfaceId,
        enabled: bool,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    SetClusterIcons {
        surface: SurfaceId,
        icons: Vec<(u32, String)>,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    OnCameraChanged {
        surface: SurfaceId,
        bounds: GeoBounds,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    SetTouchRegions {
        surface: SurfaceId,
        regions: Vec<ScreenRect>,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    SetSurfaceEnabled {
        surface: SurfaceId,
        enabled: bool,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    RouteTouch {
        point: ScreenPoint,
        reply: oneshot::Sender<TouchTarget>,
    },

    // Internal completions marshaled back onto the owner task.
    MarkerIconResolved {
        marker: MarkerId,
        icon: Arc<IconImage>,
    },
    InstallIconTable {
        surface: SurfaceId,
        table: ClusterIconTable,
        done: oneshot::Sender<Result<(), EngineError>>,
    },
}

// =============================================================================
// Engine
// =============================================================================

/// The overlay engine. Owns all mutable state; see the module docs.
pub struct MapEngine {
    config: EngineConfig,
    resolver: Arc<dyn IconResolver>,
    probe: Box<dyn DocumentProbe>,
    surfaces: SurfaceRegistry,
    markers: MarkerRegistry,
    cache: MarkerCache,
    metrics: Arc<EngineMetrics>,
    self_tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<Command>,
}

impl MapEngine {
    /// Create an engine and the handle used to drive it.
    ///
    /// The engine does nothing until [`MapEngine::run`] is spawned.
    pub fn new(
        config: EngineConfig,
        resolver: Arc<dyn IconResolver>,
        probe: Box<dyn DocumentProbe>,
    ) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let metrics = Arc::new(EngineMetrics::new());

        let handle = EngineHandle {
            tx: tx.clone(),
            metrics: Arc::clone(&metrics),
        };

        let engine = Self {
            config,
            resolver,
            probe,
            surfaces: SurfaceRegistry::new(),
            markers: MarkerRegistry::new(),
            cache: MarkerCache::new(),
            metrics,
            self_tx: tx,
            rx,
        };

        (engine, handle)
    }

    /// Create an engine backed by the default HTTP icon resolver.
    ///
    /// The resolver's per-request timeout comes from the config.
    pub fn with_http_resolver(
        config: EngineConfig,
        probe: Box<dyn DocumentProbe>,
    ) -> Result<(Self, EngineHandle), IconError> {
        let resolver = Arc::new(HttpIconResolver::new(config.icon_timeout)?);
        Ok(Self::new(config, resolver, probe))
    }

    /// Run the owner task until shutdown is signalled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("map engine starting");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("map engine shutting down");
                    break;
                }

                command = self.rx.recv() => {
                    match command {
                        Some(command) => self.handle(command),
                        None => break,
                    }
                }
            }
        }

        info!("map engine stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::CreateSurface {
                render,
                options,
                reply,
            } => {
                let id = self.handle_create_surface(render, options);
                let _ = reply.send(id);
            }
            Command::RemoveSurface { surface, reply } => {
                let _ = reply.send(self.handle_remove_surface(surface));
            }
            Command::CreateMarker {
                surface,
                position,
                preferences,
                reply,
            } => {
                let _ = reply.send(self.handle_create_marker(surface, position, preferences));
            }
            Command::CreateMarkers {
                surface,
                batch,
                reply,
            } => {
                let _ = reply.send(self.handle_create_markers(surface, batch));
            }
            Command::RemoveMarker { marker, reply } => {
                let _ = reply.send(self.handle_remove_marker(marker));
            }
            Command::SetClusteringEnabled {
                surface,
                enabled,
                reply,
            } => {
                let _ = reply.send(self.handle_set_clustering(surface, enabled));
            }
            Command::SetCachingEnabled {
                surface,
                enabled,
                reply,
            } => {
                let _ = reply.send(self.handle_set_caching(surface, enabled));
            }
            Command::SetClusterIcons {
                surface,
                icons,
                reply,
            } => self.handle_set_cluster_icons(surface, icons, reply),
            Command::OnCameraChanged {
                surface,
                bounds,
                reply,
            } => {
                let _ = reply.send(self.handle_camera_changed(surface, bounds));
            }
            Command::SetTouchRegions {
                surface,
                regions,
                reply,
            } => {
                let _ = reply.send(self.handle_set_touch_regions(surface, regions));
            }
            Command::SetSurfaceEnabled {
                surface,
                enabled,
                reply,
            } => {
                let _ = reply.send(self.handle_set_surface_enabled(surface, enabled));
            }
            Command::RouteTouch { point, reply } => {
                let _ = reply.send(self.handle_route_touch(point));
            }
            Command::MarkerIconResolved { marker, icon } => {
                self.handle_marker_icon_resolved(marker, icon);
            }
            Command::InstallIconTable {
                surface,
                table,
                done,
            } => {
                self.handle_install_icon_table(surface, table);
                let _ = done.send(Ok(()));
            }
        }
    }

    fn handle_create_surface(
        &mut self,
        render: Box<dyn RenderSurface>,
        options: SurfaceOptions,
    ) -> SurfaceId {
        let surface = MapSurface::new(render, options, self.config.cluster.clone());
        let id = self.surfaces.insert(surface);
        debug!(surface = %id, "surface created");
        id
    }

    fn handle_remove_surface(&mut self, surface_id: SurfaceId) -> Result<(), EngineError> {
        if self.surfaces.remove(surface_id).is_none() {
            return Err(EngineError::SurfaceNotFound(surface_id));
        }

        // Clear now-stale owning references; the render handle is gone with
        // the surface, so there is nothing to detach from.
        for marker in self.markers.iter_mut() {
            if marker.surface == Some(surface_id) {
                marker.surface = None;
            }
        }
        self.cache.clear(surface_id);

        debug!(surface = %surface_id, "surface removed");
        Ok(())
    }

    fn handle_create_marker(
        &mut self,
        surface_id: SurfaceId,
        position: LatLng,
        preferences: MarkerPreferences,
    ) -> Result<MarkerId, EngineError> {
        if !self.surfaces.contains(surface_id) {
            return Err(EngineError::SurfaceNotFound(surface_id));
        }

        let mut marker = Marker::new(position, preferences);
        let id = marker.id();

        if let Some(url) = marker.preferences.icon_url.clone() {
            self.spawn_marker_icon(id, url);
        }

        let surface = self
            .surfaces
            .get_mut(surface_id)
            .ok_or(EngineError::SurfaceNotFound(surface_id))?;

        // Place immediately; the next presentation pass re-evaluates the
        // placement for clustering.
        surface.render.attach(&marker);
        marker.surface = Some(surface_id);

        if surface.caching_enabled {
            self.cache.add(id, surface_id);
        }

        self.markers.insert(marker);
        self.metrics.marker_created();
        debug!(marker = %id, surface = %surface_id, "marker created");
        Ok(id)
    }

    fn handle_create_markers(
        &mut self,
        surface_id: SurfaceId,
        batch: Vec<(LatLng, MarkerPreferences)>,
    ) -> Result<Vec<MarkerId>, EngineError> {
        if !self.surfaces.contains(surface_id) {
            return Err(EngineError::SurfaceNotFound(surface_id));
        }

        batch
            .into_iter()
            .map(|(position, preferences)| {
                self.handle_create_marker(surface_id, position, preferences)
            })
            .collect()
    }

    fn handle_remove_marker(&mut self, marker_id: MarkerId) -> Result<(), EngineError> {
        let marker = self
            .markers
            .remove(marker_id)
            .ok_or(EngineError::MarkerNotFound(marker_id))?;

        if let Some(surface_id) = marker.surface {
            if let Some(surface) = self.surfaces.get_mut(surface_id) {
                surface.render.detach(marker_id);
            }
        }

        // The caller's surface association may be stale; scan them all.
        self.cache.remove_by_identity(marker_id);
        self.metrics.marker_removed();
        debug!(marker = %marker_id, "marker removed");
        Ok(())
    }

    fn handle_set_clustering(
        &mut self,
        surface_id: SurfaceId,
        enabled: bool,
    ) -> Result<(), EngineError> {
        let surface = self
            .surfaces
            .get_mut(surface_id)
            .ok_or(EngineError::SurfaceNotFound(surface_id))?;

        if surface.clustering_enabled == enabled {
            // Idempotent toggle with nothing to do.
            return Ok(());
        }

        surface.clustering_enabled = enabled;
        if enabled {
            surface.coordinator = Some(ClusterCoordinator::new(
                surface_id,
                self.config.cluster.clone(),
            ));
        } else if let Some(mut coordinator) = surface.coordinator.take() {
            coordinator.disable(surface.render.as_mut());
        }

        let bounds = surface.render.viewport_bounds();
        self.present_surface(surface_id, bounds);
        debug!(surface = %surface_id, enabled, "clustering toggled");
        Ok(())
    }

    fn handle_set_caching(
        &mut self,
        surface_id: SurfaceId,
        enabled: bool,
    ) -> Result<(), EngineError> {
        let surface = self
            .surfaces
            .get_mut(surface_id)
            .ok_or(EngineError::SurfaceNotFound(surface_id))?;

        if surface.caching_enabled == enabled {
            return Ok(());
        }

        surface.caching_enabled = enabled;
        let bounds = surface.render.viewport_bounds();

        if enabled {
            // Seed the cache with markers the surface currently owns so the
            // next presentation pass has a candidate set to work from.
            for marker in self.markers.iter() {
                if marker.surface == Some(surface_id) {
                    self.cache.add(marker.id(), surface_id);
                }
            }
        } else {
            self.cache.clear(surface_id);
        }

        self.present_surface(surface_id, bounds);
        debug!(surface = %surface_id, enabled, "caching toggled");
        Ok(())
    }

    fn handle_set_cluster_icons(
        &mut self,
        surface_id: SurfaceId,
        icons: Vec<(u32, String)>,
        reply: oneshot::Sender<Result<(), EngineError>>,
    ) {
        if !self.surfaces.contains(surface_id) {
            let _ = reply.send(Err(EngineError::SurfaceNotFound(surface_id)));
            return;
        }

        let resolver = Arc::clone(&self.resolver);
        let metrics = Arc::clone(&self.metrics);
        let tx = self.self_tx.clone();
        let (width, height) = (self.config.icon_width, self.config.icon_height);

        // The batch suspends between URLs; everything it touches afterwards
        // goes back through the command channel.
        tokio::spawn(async move {
            let requested = icons.len();
            let table = resolve_batch(resolver.as_ref(), &icons, width, height).await;

            metrics.icons_loaded(table.len() as u64);
            metrics.icons_failed((requested - table.len()) as u64);

            let _ = tx
                .send(Command::InstallIconTable {
                    surface: surface_id,
                    table,
                    done: reply,
                })
                .await;
        });
    }

    fn handle_install_icon_table(&mut self, surface_id: SurfaceId, table: ClusterIconTable) {
        match self.surfaces.get_mut(surface_id) {
            Some(surface) => {
                debug!(surface = %surface_id, buckets = table.len(), "cluster icon table installed");
                surface.icon_table = table;
            }
            None => {
                // Surface torn down while the batch was in flight.
                debug!(surface = %surface_id, "dropping icon table for removed surface");
            }
        }
    }

    fn handle_marker_icon_resolved(&mut self, marker_id: MarkerId, icon: Arc<IconImage>) {
        let Some(marker) = self.markers.get_mut(marker_id) else {
            // Marker removed while its icon was resolving.
            debug!(marker = %marker_id, "dropping icon for removed marker");
            return;
        };

        marker.icon = Some(icon);

        // Refresh the placement so the surface picks up the new icon.
        if let Some(surface_id) = marker.surface {
            if let Some(surface) = self.surfaces.get_mut(surface_id) {
                surface.render.attach(marker);
            }
        }
    }

    fn handle_camera_changed(
        &mut self,
        surface_id: SurfaceId,
        bounds: GeoBounds,
    ) -> Result<(), EngineError> {
        if !self.surfaces.contains(surface_id) {
            return Err(EngineError::SurfaceNotFound(surface_id));
        }
        self.present_surface(surface_id, bounds);
        Ok(())
    }

    fn handle_set_touch_regions(
        &mut self,
        surface_id: SurfaceId,
        regions: Vec<ScreenRect>,
    ) -> Result<(), EngineError> {
        let surface = self
            .surfaces
            .get_mut(surface_id)
            .ok_or(EngineError::SurfaceNotFound(surface_id))?;
        surface.touch_regions = regions;
        Ok(())
    }

    fn handle_set_surface_enabled(
        &mut self,
        surface_id: SurfaceId,
        enabled: bool,
    ) -> Result<(), EngineError> {
        let surface = self
            .surfaces
            .get_mut(surface_id)
            .ok_or(EngineError::SurfaceNotFound(surface_id))?;
        surface.enabled = enabled;
        Ok(())
    }

    fn handle_route_touch(&mut self, point: ScreenPoint) -> TouchTarget {
        let target = touch::route(point, &self.surfaces, self.probe.as_ref());
        match target {
            TouchTarget::Document => self.metrics.touch_document(),
            TouchTarget::Native(_) => self.metrics.touch_native(),
        }
        target
    }

    fn present_surface(&mut self, surface_id: SurfaceId, bounds: GeoBounds) {
        let clustered = self
            .surfaces
            .get(surface_id)
            .map(|s| s.clustering_enabled)
            .unwrap_or(false);

        visibility::present(
            &mut self.surfaces,
            &mut self.markers,
            &self.cache,
            surface_id,
            bounds,
        );

        if clustered {
            self.metrics.cluster_pass();
        }
    }

    fn spawn_marker_icon(&self, marker_id: MarkerId, url: String) {
        let resolver = Arc::clone(&self.resolver);
        let metrics = Arc::clone(&self.metrics);
        let tx = self.self_tx.clone();
        let (width, height) = (self.config.icon_width, self.config.icon_height);

        tokio::spawn(async move {
            match resolver.resolve(&url, width, height).await {
                Ok(icon) => {
                    metrics.icon_loaded();
                    let _ = tx
                        .send(Command::MarkerIconResolved {
                            marker: marker_id,
                            icon,
                        })
                        .await;
                }
                Err(error) => {
                    // The marker keeps its default icon; nothing to deliver.
                    metrics.icon_failed();
                    warn!(marker = %marker_id, url = %url, %error, "marker icon failed to resolve");
                }
            }
        });
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable handle for driving the engine from the bridge layer.
///
/// Every method is a command round-trip to the owner task. A closed engine
/// surfaces as [`EngineError::ShuttingDown`].
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
    metrics: Arc<EngineMetrics>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| EngineError::ShuttingDown)?;
        rx.await.map_err(|_| EngineError::ShuttingDown)
    }

    /// Register a native map surface and receive its id.
    pub async fn create_surface(
        &self,
        render: Box<dyn RenderSurface>,
        options: SurfaceOptions,
    ) -> Result<SurfaceId, EngineError> {
        self.request(|reply| Command::CreateSurface {
            render,
            options,
            reply,
        })
        .await
    }

    /// Tear down a surface and clear its cached markers.
    pub async fn remove_surface(&self, surface: SurfaceId) -> Result<(), EngineError> {
        self.request(|reply| Command::RemoveSurface { surface, reply })
            .await?
    }

    /// Create a marker on a surface.
    ///
    /// When the preferences carry an icon URL, resolution proceeds
    /// asynchronously; the marker is placed immediately and updated when
    /// the icon lands.
    pub async fn create_marker(
        &self,
        surface: SurfaceId,
        position: LatLng,
        preferences: MarkerPreferences,
    ) -> Result<MarkerId, EngineError> {
        self.request(|reply| Command::CreateMarker {
            surface,
            position,
            preferences,
            reply,
        })
        .await?
    }

    /// Create several markers on a surface in one call.
    pub async fn create_markers(
        &self,
        surface: SurfaceId,
        batch: Vec<(LatLng, MarkerPreferences)>,
    ) -> Result<Vec<MarkerId>, EngineError> {
        self.request(|reply| Command::CreateMarkers {
            surface,
            batch,
            reply,
        })
        .await?
    }

    /// Remove a marker wherever it currently lives.
    pub async fn remove_marker(&self, marker: MarkerId) -> Result<(), EngineError> {
        self.request(|reply| Command::RemoveMarker { marker, reply })
            .await?
    }

    /// Enable or disable clustering for a surface.
    pub async fn set_clustering_enabled(
        &self,
        surface: SurfaceId,
        enabled: bool,
    ) -> Result<(), EngineError> {
        self.request(|reply| Command::SetClusteringEnabled {
            surface,
            enabled,
            reply,
        })
        .await?
    }

    /// Enable or disable marker caching for a surface.
    pub async fn set_caching_enabled(
        &self,
        surface: SurfaceId,
        enabled: bool,
    ) -> Result<(), EngineError> {
        self.request(|reply| Command::SetCachingEnabled {
            surface,
            enabled,
            reply,
        })
        .await?
    }

    /// Replace a surface's cluster badge icons.
    ///
    /// `icons` pairs each size threshold with the URL to resolve for it.
    /// The returned future completes once the whole batch has resolved,
    /// mirroring the batch's single completion signal.
    pub async fn set_cluster_icons(
        &self,
        surface: SurfaceId,
        icons: Vec<(u32, String)>,
    ) -> Result<(), EngineError> {
        self.request(|reply| Command::SetClusterIcons {
            surface,
            icons,
            reply,
        })
        .await?
    }

    /// Report a camera change; triggers the presentation pass.
    pub async fn on_camera_changed(
        &self,
        surface: SurfaceId,
        bounds: GeoBounds,
    ) -> Result<(), EngineError> {
        self.request(|reply| Command::OnCameraChanged {
            surface,
            bounds,
            reply,
        })
        .await?
    }

    /// Replace a surface's touch hole regions wholesale.
    pub async fn set_touch_regions(
        &self,
        surface: SurfaceId,
        regions: Vec<ScreenRect>,
    ) -> Result<(), EngineError> {
        self.request(|reply| Command::SetTouchRegions {
            surface,
            regions,
            reply,
        })
        .await?
    }

    /// Enable or disable user interaction for a surface.
    pub async fn set_surface_enabled(
        &self,
        surface: SurfaceId,
        enabled: bool,
    ) -> Result<(), EngineError> {
        self.request(|reply| Command::SetSurfaceEnabled {
            surface,
            enabled,
            reply,
        })
        .await?
    }

    /// Decide which surface receives a pointer-down at `point`.
    pub async fn route_touch(&self, point: ScreenPoint) -> Result<TouchTarget, EngineError> {
        self.request(|reply| Command::RouteTouch { point, reply })
            .await
    }

    /// Point-in-time engine counters.
    pub fn metrics(&self) -> TelemetrySnapshot {
        self.metrics.snapshot()
    }
}

// =============================================================================
// Tests
// =============================================================================
