//! Touch routing between the document surface and native map surfaces.
//!
//! The native map and the host document are composited as overlapping
//! layers with partially transparent regions. Naive z-order hit testing
//! would either swallow every document click or make the map unreachable,
//! so each pointer-down is arbitrated explicitly:
//!
//! 1. Declared hole regions always win for the document, so document-rendered
//!    controls stay clickable even inside the map's bounding area.
//! 2. A native hit only wins when the document is fully transparent at the
//!    point, i.e. nothing document-rendered is visually on top.
//! 3. Everything else falls through to the document.
//!
//! The arbiter is stateless per event; the only inputs are the immutable
//! hole-region sets and the surface handles.

use tracing::trace;

use crate::geo::ScreenPoint;
use crate::surface::{ElementId, SurfaceRegistry};

/// Destination of a routed pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchTarget {
    /// Deliver to the host document surface.
    Document,
    /// Deliver to an element of a native map surface.
    Native(ElementId),
}

/// Samples the host document's visual content.
///
/// The platform layer implements this by reading the composited layer's
/// pixel alpha at a point.
pub trait DocumentProbe: Send {
    /// Whether the document's content is fully transparent at `point`.
    fn is_transparent_at(&self, point: ScreenPoint) -> bool;
}

/// Decide which surface receives a pointer-down at `point`.
///
/// Surfaces that are disabled for interaction are skipped entirely; when no
/// native surface is present at all, the decision is step 3's fallthrough.
pub fn route(
    point: ScreenPoint,
    surfaces: &SurfaceRegistry,
    document: &dyn DocumentProbe,
) -> TouchTarget {
    // Step 1: hole regions take precedence over everything else.
    for surface in surfaces.iter().filter(|s| s.is_enabled()) {
        if surface.touch_regions().iter().any(|r| r.contains(point)) {
            trace!(%point, surface = %surface.id(), "point inside hole region");
            return TouchTarget::Document;
        }
    }

    // Step 2: native hit test, tie-broken by document transparency.
    for surface in surfaces.iter().filter(|s| s.is_enabled()) {
        let local = surface.render.localize(point);
        if let Some(element) = surface.render.hit_test(local) {
            if document.is_transparent_at(point) {
                trace!(%point, surface = %surface.id(), "routed to native element");
                return TouchTarget::Native(element);
            }
        }
    }

    // Step 3: default document hit testing.
    TouchTarget::Document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;
    use crate::geo::ScreenRect;
    use crate::surface::{MapSurface, SurfaceOptions};
    use crate::testutil::{FakeProbe, FakeRenderSurface};

    fn registry_with(fake: FakeRenderSurface, regions: Vec<ScreenRect>) -> SurfaceRegistry {
        let mut surfaces = SurfaceRegistry::new();
        surfaces.insert(MapSurface::new(
            Box::new(fake),
            SurfaceOptions {
                touch_regions: regions,
                ..Default::default()
            },
            ClusterConfig::default(),
        ));
        surfaces
    }

    #[test]
    fn test_hole_region_beats_native_hit() {
        let fake = FakeRenderSurface::with_hit(ElementId(1));
        let surfaces = registry_with(fake, vec![ScreenRect::new(10.0, 10.0, 50.0, 50.0)]);

        // Native hit-tests positively at (20, 20), but the hole wins.
        let target = route(ScreenPoint::new(20.0, 20.0), &surfaces, &FakeProbe::transparent());
        assert_eq!(target, TouchTarget::Document);
    }

    #[test]
    fn test_native_hit_with_transparent_document() {
        let fake = FakeRenderSurface::with_hit(ElementId(7));
        let surfaces = registry_with(fake, vec![]);

        let target = route(ScreenPoint::new(100.0, 100.0), &surfaces, &FakeProbe::transparent());
        assert_eq!(target, TouchTarget::Native(ElementId(7)));
    }

    #[test]
    fn test_opaque_document_falls_through() {
        let fake = FakeRenderSurface::with_hit(ElementId(7));
        let surfaces = registry_with(fake, vec![]);

        // Something document-rendered is visually on top at the point.
        let target = route(ScreenPoint::new(100.0, 100.0), &surfaces, &FakeProbe::opaque());
        assert_eq!(target, TouchTarget::Document);
    }

    #[test]
    fn test_native_miss_falls_through() {
        let fake = FakeRenderSurface::new(); // hit-tests negatively
        let surfaces = registry_with(fake, vec![]);

        let target = route(ScreenPoint::new(100.0, 100.0), &surfaces, &FakeProbe::transparent());
        assert_eq!(target, TouchTarget::Document);
    }

    #[test]
    fn test_no_surfaces_falls_through() {
        let surfaces = SurfaceRegistry::new();
        let target = route(ScreenPoint::new(1.0, 1.0), &surfaces, &FakeProbe::transparent());
        assert_eq!(target, TouchTarget::Document);
    }

    #[test]
    fn test_disabled_surface_never_wins() {
        let fake = FakeRenderSurface::with_hit(ElementId(7));
        let mut surfaces = registry_with(fake, vec![]);
        for surface in surfaces.iter_mut() {
            surface.enabled = false;
        }

        let target = route(ScreenPoint::new(100.0, 100.0), &surfaces, &FakeProbe::transparent());
        assert_eq!(target, TouchTarget::Document);
    }

    #[test]
    fn test_point_outside_hole_still_routes_native() {
        let fake = FakeRenderSurface::with_hit(ElementId(3));
        let surfaces = registry_with(fake, vec![ScreenRect::new(10.0, 10.0, 50.0, 50.0)]);

        let target = route(ScreenPoint::new(200.0, 200.0), &surfaces, &FakeProbe::transparent());
        assert_eq!(target, TouchTarget::Native(ElementId(3)));
    }
}
