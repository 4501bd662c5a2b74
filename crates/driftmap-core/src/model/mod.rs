// ── Domain model ──
//
// Canonical types for the sync engine. Raw wire payloads live here too:
// validation happens at the boundary (`DevicePayload` → `Device`), so
// everything past the controller's entry points is already well-formed.

pub mod device;
pub mod event;
pub mod geo;

// ── Re-exports ──────────────────────────────────────────────────────
// Flat access: `use driftmap_core::model::*` gives you everything.

pub use device::{Device, DeviceId, DeviceMetrics, DevicePayload, PopupContent};
pub use event::{InboundEvent, OutboundEvent};
pub use geo::{BoundingBox, LngLat};
