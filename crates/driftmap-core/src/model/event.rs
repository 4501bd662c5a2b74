// ── Event boundary ──
//
// Explicit tagged-variant event types, one inbound variant per wire
// event. Deserialization *is* the shape validation: unknown events and
// malformed envelopes are rejected at the boundary instead of trusting
// fields to exist downstream.

use serde::{Deserialize, Serialize};

use super::device::{DeviceId, DevicePayload};
use super::geo::LngLat;
use crate::error::SyncError;

/// Server-pushed events consumed by the sync controller.
///
/// Wire envelope: `{"event": "<name>", "payload": {...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Full reset: the registry is replaced by exactly these devices.
    InitialBatch { devices: Vec<DevicePayload> },
    /// Incremental update for a subset of devices.
    IncrementalUpdate { devices: Vec<DevicePayload> },
    /// Exclusive visual emphasis on one device, or none.
    Highlight {
        #[serde(default)]
        device_id: Option<DeviceId>,
    },
    /// Position history for one device, most-recent-first.
    TrailUpdate {
        device_id: DeviceId,
        trail: Vec<LngLat>,
    },
    /// Tear down the active trail, if any.
    ClearTrail,
    /// Show only the listed devices (or everything with `show_all`).
    Filter {
        device_ids: Vec<DeviceId>,
        #[serde(default)]
        show_all: bool,
    },
}

impl InboundEvent {
    /// Decode a wire envelope, mapping decode failures to the local
    /// error taxonomy.
    pub fn from_json(raw: &str) -> Result<Self, SyncError> {
        serde_json::from_str(raw).map_err(|e| SyncError::MalformedPayload {
            message: e.to_string(),
        })
    }
}

/// Events raised by the engine toward its host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Raised exactly once, on the first successful surface load.
    SurfaceReady,
    /// A device's displayed position changed locally (jitter or drag);
    /// lets other observers of the same device converge.
    DevicePositionChanged {
        device_id: DeviceId,
        lon: f64,
        lat: f64,
    },
    /// The user clicked a device marker.
    DeviceSelected { device_id: DeviceId },
    /// A caught failure, reported as data instead of propagated.
    ErrorReport { message: String },
}
