//! Shared test fakes.
//!
//! An in-memory [`RenderSurface`] that records attachments, and a
//! [`DocumentProbe`] with configurable transparency. Used by the surface,
//! visibility, touch and engine tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::cluster::ClusterBadge;
use crate::geo::{GeoBounds, ScreenPoint};
use crate::marker::{Marker, MarkerId};
use crate::surface::{ElementId, RenderSurface};
use crate::touch::DocumentProbe;

/// Observable state of a fake render surface.
#[derive(Debug)]
pub(crate) struct FakeSurfaceState {
    /// Markers currently attached.
    pub attached: HashSet<MarkerId>,
    /// Cluster badges currently attached.
    pub badges: Vec<ClusterBadge>,
    /// Element returned by every hit test, `None` for a miss.
    pub hit: Option<ElementId>,
    /// Viewport reported to callers.
    pub bounds: GeoBounds,
    /// Total attach calls, for churn assertions.
    pub attach_calls: usize,
}

/// In-memory render surface; clone to keep an inspection handle.
#[derive(Clone)]
pub(crate) struct FakeRenderSurface {
    state: Arc<Mutex<FakeSurfaceState>>,
}

impl FakeRenderSurface {
    pub(crate) fn new() -> Self {
        Self::with_bounds(GeoBounds::new(90.0, -90.0, 180.0, -180.0))
    }

    pub(crate) fn with_bounds(bounds: GeoBounds) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeSurfaceState {
                attached: HashSet::new(),
                badges: Vec::new(),
                hit: None,
                bounds,
                attach_calls: 0,
            })),
        }
    }

    pub(crate) fn with_hit(element: ElementId) -> Self {
        let fake = Self::new();
        fake.state.lock().unwrap().hit = Some(element);
        fake
    }

    pub(crate) fn state(&self) -> Arc<Mutex<FakeSurfaceState>> {
        Arc::clone(&self.state)
    }
}

impl RenderSurface for FakeRenderSurface {
    fn attach(&mut self, marker: &Marker) {
        let mut state = self.state.lock().unwrap();
        state.attached.insert(marker.id());
        state.attach_calls += 1;
    }

    fn detach(&mut self, marker: MarkerId) {
        self.state.lock().unwrap().attached.remove(&marker);
    }

    fn attach_cluster(&mut self, badge: &ClusterBadge) {
        self.state.lock().unwrap().badges.push(badge.clone());
    }

    fn clear_clusters(&mut self) {
        self.state.lock().unwrap().badges.clear();
    }

    fn hit_test(&self, _point: ScreenPoint) -> Option<ElementId> {
        self.state.lock().unwrap().hit
    }

    fn viewport_bounds(&self) -> GeoBounds {
        self.state.lock().unwrap().bounds
    }

    fn localize(&self, point: ScreenPoint) -> ScreenPoint {
        point
    }
}

/// Deterministic in-memory icon resolver.
///
/// Succeeds with a blank image of the requested size unless the URL is in
/// the failing set; records every call in order.
pub(crate) struct FakeIconResolver {
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeIconResolver {
    pub(crate) fn new() -> Self {
        Self {
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_on(urls: &[&str]) -> Self {
        Self {
            failing: urls.iter().map(|u| u.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl crate::icon::IconResolver for FakeIconResolver {
    fn resolve(
        &self,
        url: &str,
        width: u32,
        height: u32,
    ) -> futures::future::BoxFuture<'_, Result<Arc<crate::icon::IconImage>, crate::icon::IconError>>
    {
        let url = url.to_string();
        Box::pin(async move {
            self.calls.lock().unwrap().push(url.clone());
            if self.failing.contains(&url) {
                Err(crate::icon::IconError::Http(format!("HTTP 404 from {url}")))
            } else {
                Ok(Arc::new(crate::icon::IconImage::new(
                    image::RgbaImage::new(width, height),
                )))
            }
        })
    }
}

/// Document probe reporting a fixed transparency answer.
pub(crate) struct FakeProbe {
    transparent: bool,
}

impl FakeProbe {
    pub(crate) fn transparent() -> Self {
        Self { transparent: true }
    }

    pub(crate) fn opaque() -> Self {
        Self { transparent: false }
    }
}

impl DocumentProbe for FakeProbe {
    fn is_transparent_at(&self, _point: ScreenPoint) -> bool {
        self.transparent
    }
}
