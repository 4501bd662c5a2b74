// ── Core error types ──
//
// Nothing here ever crosses the component boundary as an unhandled
// failure: the controller catches every fault at the event boundary and
// degrades to a no-op plus an `ErrorReport` outbound event. These types
// exist so the internal operations can use `?` and still produce a
// useful upstream message.

use thiserror::Error;

/// Faults raised by a [`RenderSurface`](crate::surface::RenderSurface)
/// implementation.
#[derive(Debug, Clone, Error)]
pub enum SurfaceError {
    #[error("render surface not loaded")]
    NotLoaded,

    #[error("unknown source: {id}")]
    UnknownSource { id: String },

    #[error("unknown layer: {id}")]
    UnknownLayer { id: String },

    #[error("render backend error: {message}")]
    Backend { message: String },
}

/// Unified error type for the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    // ── Payload errors ───────────────────────────────────────────────
    #[error("invalid coordinates for device {device_id}: lon={lon:?} lat={lat:?}")]
    InvalidCoordinates {
        device_id: String,
        lon: Option<f64>,
        lat: Option<f64>,
    },

    #[error("malformed event payload: {message}")]
    MalformedPayload { message: String },

    // ── Surface errors (wrapped, reported upstream, never retried) ───
    #[error("render surface error: {0}")]
    Surface(#[from] SurfaceError),
}
