// driftmap-core: Synchronization layer between server-pushed device events
// and a map render surface (markers, trail, highlight, jitter walk).

pub mod config;
pub mod controller;
pub mod error;
pub mod jitter;
pub mod model;
pub mod registry;
pub mod session;
pub mod surface;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{JitterConfig, MarkerTheme, SessionConfig};
pub use controller::{SessionState, SyncController};
pub use error::{SurfaceError, SyncError};
pub use jitter::JitterAnimator;
pub use registry::{DeviceRegistry, MarkerState};
pub use session::MapSession;
pub use surface::{LayerStyle, MarkerStyle, NoopSurface, RenderSurface};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    BoundingBox, Device, DeviceId, DeviceMetrics, DevicePayload, InboundEvent, LngLat,
    OutboundEvent, PopupContent,
};
