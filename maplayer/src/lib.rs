//! Maplayer: native map overlay core.
//!
//! Embeds an interactive native map surface beneath/above a host document
//! surface and keeps the two consistent: a per-surface marker cache, a
//! clustering engine with clear-then-add semantics, an asynchronous icon
//! resolution pipeline, and a touch-routing arbiter that decides which
//! overlapping surface receives each pointer event.
//!
//! All mutable state lives behind the single-writer [`engine::MapEngine`];
//! the bridge layer drives it through a cloneable [`engine::EngineHandle`].
//! Platform concerns (actual rendering, pixel sampling, image storage)
//! enter through the [`surface::RenderSurface`], [`touch::DocumentProbe`]
//! and [`icon::IconResolver`] traits.

pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod icon;
pub mod marker;
pub mod surface;
pub mod telemetry;
pub mod touch;
pub mod visibility;

#[cfg(test)]
pub(crate) mod testutil;

pub use cluster::ClusterBadge;
pub use config::{ClusterConfig, EngineConfig};
pub use engine::{EngineHandle, MapEngine};
pub use error::EngineError;
pub use geo::{GeoBounds, LatLng, ScreenPoint, ScreenRect};
pub use icon::{HttpIconResolver, IconError, IconImage, IconResolver};
pub use marker::{Marker, MarkerId, MarkerPreferences};
pub use surface::{ElementId, RenderSurface, SurfaceId, SurfaceOptions};
pub use touch::{DocumentProbe, TouchTarget};
