//! Engine error types.
//!
//! The overlay core resolves almost every failure at the point of detection:
//! icon resolution failures are skipped inside the batch, stale surface
//! references are cleared lazily, and idempotent toggles with nothing to do
//! are silent no-ops. The only caller-visible rejections are the variants
//! below.

use thiserror::Error;

use crate::marker::MarkerId;
use crate::surface::SurfaceId;

/// Errors surfaced to callers of the engine handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The referenced map surface does not exist in the registry.
    #[error("map surface {0} not found")]
    SurfaceNotFound(SurfaceId),

    /// The referenced marker does not exist in the registry.
    #[error("marker {0} not found")]
    MarkerNotFound(MarkerId),

    /// The engine's command loop has shut down and can no longer accept work.
    #[error("engine is shutting down")]
    ShuttingDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::ShuttingDown;
        assert_eq!(err.to_string(), "engine is shutting down");

        let err = EngineError::SurfaceNotFound(SurfaceId::from_raw(7));
        assert!(err.to_string().contains('7'));
    }
}
