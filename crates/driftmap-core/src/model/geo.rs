// ── Geographic value types ──

use serde::{Deserialize, Serialize};
use std::fmt;

/// A longitude/latitude pair in degrees.
///
/// Wire form is a two-element array `[lon, lat]`, matching the GeoJSON
/// coordinate order used by the event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lon: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Both components finite and within the WGS84 coordinate domain.
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }

    /// Euclidean distance in degree space. Good enough for the small
    /// displacements the jitter walk produces; not a geodesic.
    pub fn distance_deg(&self, other: &Self) -> f64 {
        let dx = self.lon - other.lon;
        let dy = self.lat - other.lat;
        dx.hypot(dy)
    }
}

impl From<[f64; 2]> for LngLat {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lon, lat }
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(p: LngLat) -> Self {
        [p.lon, p.lat]
    }
}

impl fmt::Display for LngLat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lon, self.lat)
    }
}

/// Axis-aligned bounding box over a set of positions, used for viewport
/// fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: LngLat,
    pub max: LngLat,
}

impl BoundingBox {
    /// Compute the bounding box of a non-empty set of positions.
    /// Returns `None` for an empty slice -- there is nothing to fit.
    pub fn from_points(points: &[LngLat]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self {
            min: *first,
            max: *first,
        };
        for p in &points[1..] {
            bbox.extend(*p);
        }
        Some(bbox)
    }

    pub fn extend(&mut self, p: LngLat) {
        self.min.lon = self.min.lon.min(p.lon);
        self.min.lat = self.min.lat.min(p.lat);
        self.max.lon = self.max.lon.max(p.lon);
        self.max.lat = self.max.lat.max(p.lat);
    }

    pub fn center(&self) -> LngLat {
        LngLat::new(
            (self.min.lon + self.max.lon) / 2.0,
            (self.min.lat + self.max.lat) / 2.0,
        )
    }
}
