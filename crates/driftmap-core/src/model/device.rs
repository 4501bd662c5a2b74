// ── Device domain types ──
//
// `DevicePayload` is the raw wire record; `Device` is the validated
// domain entity. The conversion is the only place coordinate validity
// is checked -- everything downstream can trust `Device::position`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::geo::LngLat;
use crate::error::SyncError;

// ── DeviceId ────────────────────────────────────────────────────────

/// Unique device identifier, as assigned by the upstream tracker network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── Metrics ─────────────────────────────────────────────────────────

/// Telemetry metrics attached to a device update.
///
/// Every field is optional on the wire; display code substitutes zero
/// for anything missing rather than erroring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetrics {
    /// Average speed in m/s.
    #[serde(default)]
    pub avg_speed: Option<f64>,
    /// Elevation in meters.
    #[serde(default)]
    pub elevation: Option<f64>,
    /// Battery voltage in volts.
    #[serde(default)]
    pub voltage: Option<f64>,
    /// Received signal strength in dBm.
    #[serde(default)]
    pub rssi: Option<f64>,
    /// Signal-to-noise ratio in dB.
    #[serde(default)]
    pub snr: Option<f64>,
}

// ── Device ──────────────────────────────────────────────────────────

/// Canonical device entity, validated and ready for the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub name: Option<String>,
    /// Relay/hotspot the last packet was heard through.
    pub hotspot: Option<String>,
    /// True position as reported by the last server update.
    pub position: LngLat,
    pub metrics: DeviceMetrics,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    /// Marker popup content for this device. Missing metrics display
    /// as zero, matching the upstream convention.
    pub fn popup(&self) -> PopupContent {
        PopupContent {
            title: self
                .name
                .clone()
                .unwrap_or_else(|| self.id.as_str().to_owned()),
            avg_speed_mps: self.metrics.avg_speed.unwrap_or(0.0),
            elevation_m: self.metrics.elevation.unwrap_or(0.0),
            voltage_v: self.metrics.voltage.unwrap_or(0.0),
            rssi_dbm: self.metrics.rssi.unwrap_or(0.0),
            snr_db: self.metrics.snr.unwrap_or(0.0),
            hotspot: self.hotspot.clone(),
        }
    }
}

/// Structured popup content -- the host renders it however it likes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupContent {
    pub title: String,
    pub avg_speed_mps: f64,
    pub elevation_m: f64,
    pub voltage_v: f64,
    pub rssi_dbm: f64,
    pub snr_db: f64,
    pub hotspot: Option<String>,
}

// ── Wire payload ────────────────────────────────────────────────────

/// Raw per-device record as it arrives in an initial batch or an
/// incremental update. Coordinates are optional here on purpose: a
/// record missing them is skipped individually, never the whole batch.
#[derive(Debug, Clone, Deserialize)]
pub struct DevicePayload {
    pub device_id: DeviceId,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hotspot: Option<String>,
    #[serde(flatten)]
    pub metrics: DeviceMetrics,
}

impl DevicePayload {
    /// Validate into a domain [`Device`], stamped with `last_seen = now`.
    pub fn into_device(self, now: DateTime<Utc>) -> Result<Device, SyncError> {
        let position = match (self.lon, self.lat) {
            (Some(lon), Some(lat)) => LngLat::new(lon, lat),
            _ => {
                return Err(SyncError::InvalidCoordinates {
                    device_id: self.device_id.to_string(),
                    lon: self.lon,
                    lat: self.lat,
                })
            }
        };
        if !position.is_valid() {
            return Err(SyncError::InvalidCoordinates {
                device_id: self.device_id.to_string(),
                lon: self.lon,
                lat: self.lat,
            });
        }

        Ok(Device {
            id: self.device_id,
            name: self.name,
            hotspot: self.hotspot,
            position,
            metrics: self.metrics,
            last_seen: now,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload(json: &str) -> DevicePayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn payload_with_coordinates_validates() {
        let p = payload(r#"{"device_id":"d1","lon":10.0,"lat":20.0,"avg_speed":3.5}"#);
        let device = p.into_device(Utc::now()).unwrap();
        assert_eq!(device.id, DeviceId::from("d1"));
        assert_eq!(device.position, LngLat::new(10.0, 20.0));
        assert_eq!(device.metrics.avg_speed, Some(3.5));
        assert_eq!(device.metrics.voltage, None);
    }

    #[test]
    fn payload_missing_latitude_is_rejected() {
        let p = payload(r#"{"device_id":"d1","lon":10.0}"#);
        let err = p.into_device(Utc::now()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidCoordinates { .. }));
    }

    #[test]
    fn payload_outside_coordinate_domain_is_rejected() {
        let p = payload(r#"{"device_id":"d1","lon":500.0,"lat":20.0}"#);
        assert!(p.into_device(Utc::now()).is_err());
    }

    #[test]
    fn popup_substitutes_zero_for_missing_metrics() {
        let p = payload(r#"{"device_id":"d1","lon":1.0,"lat":2.0}"#);
        let device = p.into_device(Utc::now()).unwrap();
        let popup = device.popup();
        assert_eq!(popup.title, "d1");
        assert_eq!(popup.avg_speed_mps, 0.0);
        assert_eq!(popup.rssi_dbm, 0.0);
        assert_eq!(popup.hotspot, None);
    }

    #[test]
    fn popup_prefers_display_name() {
        let p = payload(r#"{"device_id":"d1","name":"Buoy 7","lon":1.0,"lat":2.0}"#);
        let device = p.into_device(Utc::now()).unwrap();
        assert_eq!(device.popup().title, "Buoy 7");
    }
}
