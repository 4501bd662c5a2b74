// ── Render surface contract ──
//
// Abstraction over the external map-drawing library. The controller
// never touches drawing primitives except through this trait, which is
// what lets the test suite substitute a recording double and lets a
// failed initialization degrade to `NoopSurface`.

use crate::config::MarkerTheme;
use crate::error::SurfaceError;
use crate::model::{BoundingBox, LngLat, PopupContent};

// ── Trail layer/source naming ───────────────────────────────────────
// Fixed ids: at most one active trail exists per surface, so the names
// never need to be parameterized by device.

pub const TRAIL_SOURCE: &str = "trail";
pub const TRAIL_POINTS_SOURCE: &str = "trail-points";
pub const TRAIL_GLOW_LAYER: &str = "trail-glow";
pub const TRAIL_LINE_LAYER: &str = "trail-line";
pub const TRAIL_POINTS_GLOW_LAYER: &str = "trail-points-glow";
pub const TRAIL_POINTS_LAYER: &str = "trail-points";

/// Marker id for the trail point at `index` (index 0 is the live
/// position and carries no extra marker).
pub fn trail_point_marker_id(index: usize) -> String {
    format!("trail-point-{index}")
}

// ── Styles ──────────────────────────────────────────────────────────

/// Style for a named layer bound to a source.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerStyle {
    Line {
        color: String,
        width_px: f64,
        opacity: f64,
        blur_px: f64,
    },
    Circle {
        color: String,
        radius_px: f64,
        opacity: f64,
        stroke_color: Option<String>,
        stroke_width_px: f64,
        blur_px: f64,
    },
}

impl LayerStyle {
    /// The soft halo behind the trail line.
    pub fn trail_glow(theme: &MarkerTheme) -> Self {
        Self::Line {
            color: theme.trail_glow_color.clone(),
            width_px: 8.0,
            opacity: 0.4,
            blur_px: 3.0,
        }
    }

    /// The trail line itself, drawn over the glow.
    pub fn trail_line(theme: &MarkerTheme) -> Self {
        Self::Line {
            color: theme.trail_color.clone(),
            width_px: 4.0,
            opacity: 0.9,
            blur_px: 0.0,
        }
    }

    pub fn trail_points_glow(theme: &MarkerTheme) -> Self {
        Self::Circle {
            color: theme.trail_color.clone(),
            radius_px: 6.0,
            opacity: 0.4,
            stroke_color: None,
            stroke_width_px: 0.0,
            blur_px: 1.0,
        }
    }

    pub fn trail_points(theme: &MarkerTheme) -> Self {
        Self::Circle {
            color: theme.trail_color.clone(),
            radius_px: 4.0,
            opacity: 0.9,
            stroke_color: Some("#ffffff".into()),
            stroke_width_px: 2.0,
            blur_px: 0.0,
        }
    }
}

/// Style for a named point marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    pub color: String,
    pub size_px: f64,
    pub opacity: f64,
}

impl MarkerStyle {
    pub fn device(theme: &MarkerTheme) -> Self {
        Self {
            color: theme.device_color.clone(),
            size_px: 20.0,
            opacity: 1.0,
        }
    }

    /// Trail point style at the given history index: older points
    /// shrink and fade, monotonically with index.
    pub fn trail_point(theme: &MarkerTheme, index: usize) -> Self {
        let i = index as f64;
        Self {
            color: theme.trail_color.clone(),
            size_px: (7.0 - i * 0.15).max(3.0),
            opacity: (1.0 - i * 0.03).max(0.3),
        }
    }
}

// ── The contract ────────────────────────────────────────────────────

/// Capabilities the sync engine consumes from the map-drawing library.
///
/// Implementations must treat removal of an unknown layer, source, or
/// marker as a successful no-op -- the controller tears visuals down
/// without tracking which ones were ever materialized.
pub trait RenderSurface {
    /// Whether the underlying style/tiles have finished loading.
    fn is_loaded(&self) -> bool;

    fn set_point_source(&mut self, source: &str, points: &[LngLat]) -> Result<(), SurfaceError>;
    fn set_line_source(&mut self, source: &str, line: &[LngLat]) -> Result<(), SurfaceError>;
    fn add_layer(&mut self, layer: &str, source: &str, style: &LayerStyle)
        -> Result<(), SurfaceError>;
    fn remove_layer(&mut self, layer: &str) -> Result<(), SurfaceError>;
    fn remove_source(&mut self, source: &str) -> Result<(), SurfaceError>;

    fn upsert_marker(
        &mut self,
        marker: &str,
        position: LngLat,
        style: &MarkerStyle,
    ) -> Result<(), SurfaceError>;
    fn move_marker(&mut self, marker: &str, position: LngLat) -> Result<(), SurfaceError>;
    fn remove_marker(&mut self, marker: &str) -> Result<(), SurfaceError>;
    fn set_marker_visible(&mut self, marker: &str, visible: bool) -> Result<(), SurfaceError>;
    fn set_marker_highlighted(&mut self, marker: &str, highlighted: bool)
        -> Result<(), SurfaceError>;
    fn set_marker_popup(&mut self, marker: &str, content: &PopupContent)
        -> Result<(), SurfaceError>;

    fn fly_to(&mut self, center: LngLat, zoom: f64) -> Result<(), SurfaceError>;
    fn fit_bounds(&mut self, bounds: &BoundingBox, padding_px: u32) -> Result<(), SurfaceError>;
}

// ── NoopSurface ─────────────────────────────────────────────────────

/// Degraded stand-in installed when the real surface fails to
/// initialize. Never reports loaded, accepts every call, draws nothing
/// -- so a broken rendering context silently absorbs the event stream
/// instead of breaking it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSurface;

impl RenderSurface for NoopSurface {
    fn is_loaded(&self) -> bool {
        false
    }

    fn set_point_source(&mut self, _: &str, _: &[LngLat]) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn set_line_source(&mut self, _: &str, _: &[LngLat]) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn add_layer(&mut self, _: &str, _: &str, _: &LayerStyle) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn remove_layer(&mut self, _: &str) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn remove_source(&mut self, _: &str) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn upsert_marker(&mut self, _: &str, _: LngLat, _: &MarkerStyle) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn move_marker(&mut self, _: &str, _: LngLat) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn remove_marker(&mut self, _: &str) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn set_marker_visible(&mut self, _: &str, _: bool) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn set_marker_highlighted(&mut self, _: &str, _: bool) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn set_marker_popup(&mut self, _: &str, _: &PopupContent) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn fly_to(&mut self, _: LngLat, _: f64) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn fit_bounds(&mut self, _: &BoundingBox, _: u32) -> Result<(), SurfaceError> {
        Ok(())
    }
}

// ── Test double ─────────────────────────────────────────────────────
