// ── Session configuration ──
//
// Built by the host and handed to `MapSession` -- the core never reads
// config files. The flags here absorb the behavioral differences that
// used to be hard-coded into per-view variants (marker colors, whether
// jitter broadcasts upstream, whether highlight is exclusive).

use std::time::Duration;

/// Configuration for one map session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub jitter: JitterConfig,
    /// Enforce at-most-one highlighted device. When disabled, applying a
    /// new highlight leaves the previous styling in place.
    pub exclusive_highlight: bool,
    /// Refit the viewport to the visible set after a filter event.
    pub fit_on_filter: bool,
    /// Viewport padding in pixels when fitting bounds.
    pub fit_padding_px: u32,
    /// Zoom used when an initial batch contains a single device
    /// (detail view behavior).
    pub detail_zoom: f64,
    pub theme: MarkerTheme,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            jitter: JitterConfig::default(),
            exclusive_highlight: true,
            fit_on_filter: true,
            fit_padding_px: 48,
            detail_zoom: 12.0,
            theme: MarkerTheme::default(),
        }
    }
}

/// Tuning for the cosmetic jitter walk.
#[derive(Debug, Clone, Copy)]
pub struct JitterConfig {
    /// Tick period. Zero disables the animator entirely.
    pub interval: Duration,
    /// Lower bound of the per-tick displacement, in degrees.
    pub min_magnitude_deg: f64,
    /// Upper bound of the per-tick displacement, in degrees.
    pub max_magnitude_deg: f64,
    /// Emit `DevicePositionChanged` for every nudge so other observers
    /// of the same device converge.
    pub broadcast_positions: bool,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            min_magnitude_deg: 0.002,
            max_magnitude_deg: 0.01,
            broadcast_positions: true,
        }
    }
}

impl JitterConfig {
    pub fn enabled(&self) -> bool {
        !self.interval.is_zero()
    }
}

/// Marker/trail color scheme. Cosmetic only.
#[derive(Debug, Clone)]
pub struct MarkerTheme {
    pub device_color: String,
    pub trail_color: String,
    pub trail_glow_color: String,
}

impl Default for MarkerTheme {
    fn default() -> Self {
        Self {
            device_color: "#3b82f6".into(),
            trail_color: "#ff6b6b".into(),
            trail_glow_color: "#ff9999".into(),
        }
    }
}
