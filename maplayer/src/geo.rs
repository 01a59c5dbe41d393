//! Geometry primitives shared across the overlay core.
//!
//! Two coordinate spaces appear throughout the crate:
//!
//! - **Geographic** (`LatLng`, `GeoBounds`): WGS84 degrees, used for marker
//!   positions and camera viewports.
//! - **Screen** (`ScreenPoint`, `ScreenRect`): document-surface pixels, used
//!   for touch routing and hole regions.
//!
//! Types here are plain `Copy` data with no behavior beyond containment
//! checks. Conversions between the two spaces belong to the render surface
//! (`RenderSurface::localize`), never to this module.

use serde::{Deserialize, Serialize};

/// A geographic position in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lng: f64,
}

impl LatLng {
    /// Create a new position.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// A geographic bounding box, the visible region of a map camera.
///
/// `north >= south` is assumed. Longitude spans crossing the antimeridian
/// (`west > east`) are handled by the containment check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    /// Northern edge latitude.
    pub north: f64,
    /// Southern edge latitude.
    pub south: f64,
    /// Eastern edge longitude.
    pub east: f64,
    /// Western edge longitude.
    pub west: f64,
}

impl GeoBounds {
    /// Create bounds from edge coordinates.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Whether the given position lies inside the bounds (edges inclusive).
    pub fn contains(&self, position: LatLng) -> bool {
        if position.lat > self.north || position.lat < self.south {
            return false;
        }
        if self.west <= self.east {
            position.lng >= self.west && position.lng <= self.east
        } else {
            // Antimeridian crossing: the span wraps around 180°.
            position.lng >= self.west || position.lng <= self.east
        }
    }

    /// Latitude span in degrees.
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude span in degrees, accounting for antimeridian wrap.
    pub fn lng_span(&self) -> f64 {
        if self.west <= self.east {
            self.east - self.west
        } else {
            360.0 - self.west + self.east
        }
    }
}

impl std::fmt::Display for GeoBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.4}N..{:.4}S {:.4}E..{:.4}W]",
            self.north, self.south, self.east, self.west
        )
    }
}

/// A point in document-surface pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    /// Create a new screen point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// An axis-aligned rectangle in document-surface pixel coordinates.
///
/// Used for touch hole regions: containment is inclusive of the origin edge
/// and exclusive of the far edge, matching platform rect semantics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    /// Create a rectangle from origin and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the point lies inside the rectangle.
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }
}
