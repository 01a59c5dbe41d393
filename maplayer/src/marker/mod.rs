//! Marker model and registries.
//!
//! A [`Marker`] is a placeable point with display preferences. Identity is
//! the process-unique [`MarkerId`], never the value: two markers may share a
//! position and identical preferences and remain distinct.
//!
//! The [`MarkerRegistry`] is the live store of every marker the engine
//! knows about, attached or not. The [`MarkerCache`](cache::MarkerCache)
//! tracks per-surface membership separately; see the `cache` module.

mod cache;

pub use cache::MarkerCache;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geo::LatLng;
use crate::icon::IconImage;
use crate::surface::SurfaceId;

/// Global counter minting process-unique marker ids.
static MARKER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(u64);

impl MarkerId {
    /// Mint the next unique id.
    pub fn next() -> Self {
        Self(MARKER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[cfg(test)]
    pub(crate) fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "marker-{}", self.0)
    }
}

/// Display preferences supplied by the bridge at marker creation.
///
/// The bridge hands these through as JSON; field defaults match what the
/// overlay applies when a key is absent from the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPreferences {
    /// Info-window title, if any.
    #[serde(default)]
    pub title: Option<String>,

    /// Icon URL to resolve asynchronously, if any.
    #[serde(default)]
    pub icon_url: Option<String>,

    /// Whether the marker can be dragged.
    #[serde(default)]
    pub draggable: bool,

    /// Stacking order relative to other markers.
    #[serde(default)]
    pub z_index: i32,

    /// Marker opacity in `[0.0, 1.0]`.
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_opacity() -> f32 {
    1.0
}

impl MarkerPreferences {
    /// Parse a preferences payload as handed through by the bridge.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

impl Default for MarkerPreferences {
    fn default() -> Self {
        Self {
            title: None,
            icon_url: None,
            draggable: false,
            z_index: 0,
            opacity: 1.0,
        }
    }
}

/// A placeable point on a map surface.
///
/// Equality and hashing use only the id; preferences and resolved icon state
/// are mutable over the marker's lifetime.
#[derive(Debug, Clone)]
pub struct Marker {
    id: MarkerId,
    /// Geographic position.
    pub position: LatLng,
    /// Display preferences.
    pub preferences: MarkerPreferences,
    /// Owning surface, `None` while unattached (e.g. pending clustering).
    pub surface: Option<SurfaceId>,
    /// Resolved icon image, `None` until async resolution completes.
    pub icon: Option<Arc<IconImage>>,
}

impl Marker {
    /// Create a new marker with a freshly minted id.
    pub fn new(position: LatLng, preferences: MarkerPreferences) -> Self {
        Self {
            id: MarkerId::next(),
            position,
            preferences,
            surface: None,
            icon: None,
        }
    }

    /// The marker's id.
    pub fn id(&self) -> MarkerId {
        self.id
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Marker {}

impl std::hash::Hash for Marker {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Live store of every marker known to the engine.
///
/// Created on engine start, dropped on engine teardown. Components receive
/// it by reference; nothing else holds marker state.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    markers: HashMap<MarkerId, Marker>,
}

impl MarkerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a marker, returning its id.
    pub fn insert(&mut self, marker: Marker) -> MarkerId {
        let id = marker.id();
        self.markers.insert(id, marker);
        id
    }

    /// Look up a marker by id.
    pub fn get(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    /// Look up a marker mutably by id.
    pub fn get_mut(&mut self, id: MarkerId) -> Option<&mut Marker> {
        self.markers.get_mut(&id)
    }

    /// Remove a marker, returning it if present.
    pub fn remove(&mut self, id: MarkerId) -> Option<Marker> {
        self.markers.remove(&id)
    }

    /// Ids of all live markers.
    pub fn ids(&self) -> Vec<MarkerId> {
        self.markers.keys().copied().collect()
    }

    /// Iterate over all live markers.
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    /// Iterate mutably over all live markers.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Marker> {
        self.markers.values_mut()
    }

    /// Number of live markers.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_ids_unique() {
        let a = Marker::new(LatLng::new(0.0, 0.0), MarkerPreferences::default());
        let b = Marker::new(LatLng::new(0.0, 0.0), MarkerPreferences::default());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_marker_equality_by_id_only() {
        let a = Marker::new(LatLng::new(1.0, 2.0), MarkerPreferences::default());
        let mut b = a.clone();
        b.position = LatLng::new(9.0, 9.0);
        // Same id, different value: still equal.
        assert_eq!(a, b);
    }

    #[test]
    fn test_preferences_from_json_defaults() {
        let prefs = MarkerPreferences::from_json("{}").unwrap();
        assert_eq!(prefs, MarkerPreferences::default());
        assert_eq!(prefs.opacity, 1.0);
    }

    #[test]
    fn test_preferences_from_json_payload() {
        let prefs = MarkerPreferences::from_json(
            r#"{"title": "Home", "icon_url": "https://example.com/pin.png",
                "draggable": true, "z_index": 3, "opacity": 0.5}"#,
        )
        .unwrap();
        assert_eq!(prefs.title.as_deref(), Some("Home"));
        assert_eq!(prefs.icon_url.as_deref(), Some("https://example.com/pin.png"));
        assert!(prefs.draggable);
        assert_eq!(prefs.z_index, 3);
        assert_eq!(prefs.opacity, 0.5);
    }

    #[test]
    fn test_registry_insert_get_remove() {
        let mut registry = MarkerRegistry::new();
        let marker = Marker::new(LatLng::new(1.0, 1.0), MarkerPreferences::default());
        let id = registry.insert(marker);

        assert_eq!(registry.len(), 1);
        assert!(registry.get(id).is_some());

        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(registry.is_empty());
        assert!(registry.remove(id).is_none());
    }
}
