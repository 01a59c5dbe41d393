//! Engine configuration.
//!
//! `EngineConfig` is the top-level configuration passed to
//! [`crate::engine::MapEngine::new`]. Defaults match the behavior of the
//! production overlay: 30×30 cluster badge icons, a 3 second icon download
//! timeout, and distance-based clustering tuned for a 4-marker minimum.

use std::time::Duration;

/// Default pixel width for resolved marker and badge icons.
pub const DEFAULT_ICON_WIDTH: u32 = 30;

/// Default pixel height for resolved marker and badge icons.
pub const DEFAULT_ICON_HEIGHT: u32 = 30;

/// Default timeout for a single icon download.
pub const DEFAULT_ICON_TIMEOUT_SECS: u64 = 3;

/// Default capacity of the engine command channel.
pub const DEFAULT_COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Top-level engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Pixel width icons are resized to after download.
    pub icon_width: u32,

    /// Pixel height icons are resized to after download.
    pub icon_height: u32,

    /// Timeout for a single icon download.
    pub icon_timeout: Duration,

    /// Command channel capacity for the engine's owner task.
    pub channel_capacity: usize,

    /// Clustering parameters.
    pub cluster: ClusterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            icon_width: DEFAULT_ICON_WIDTH,
            icon_height: DEFAULT_ICON_HEIGHT,
            icon_timeout: Duration::from_secs(DEFAULT_ICON_TIMEOUT_SECS),
            channel_capacity: DEFAULT_COMMAND_CHANNEL_CAPACITY,
            cluster: ClusterConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set the icon target size.
    pub fn with_icon_size(mut self, width: u32, height: u32) -> Self {
        self.icon_width = width;
        self.icon_height = height;
        self
    }

    /// Set the icon download timeout.
    pub fn with_icon_timeout(mut self, timeout: Duration) -> Self {
        self.icon_timeout = timeout;
        self
    }

    /// Set the command channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the clustering parameters.
    pub fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }
}

/// Parameters for the distance-based clustering pass.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Grid cell size as a fraction of the viewport span.
    ///
    /// A value of `0.125` divides the visible region into an 8×8 grid;
    /// markers sharing a cell are candidates for one cluster.
    pub cell_fraction: f64,

    /// Minimum number of markers in a cell before they collapse into a
    /// cluster. Cells below this yield direct single placements.
    pub min_cluster_size: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cell_fraction: 0.125,
            min_cluster_size: 4,
        }
    }
}

impl ClusterConfig {
    /// Set the grid cell fraction.
    pub fn with_cell_fraction(mut self, fraction: f64) -> Self {
        self.cell_fraction = fraction;
        self
    }

    /// Set the minimum cluster size.
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }
}
