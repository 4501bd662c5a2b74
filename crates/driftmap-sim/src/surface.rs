// ── Tracing-backed render surface ──
//
// Stands in for the real map library: every drawing call becomes a
// structured log line, so the whole engine lifecycle can be watched
// from a terminal.

use driftmap_core::{
    BoundingBox, LayerStyle, LngLat, MarkerStyle, PopupContent, RenderSurface, SurfaceError,
};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct TracingSurface {
    markers: usize,
}

impl TracingSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderSurface for TracingSurface {
    fn is_loaded(&self) -> bool {
        true
    }

    fn set_point_source(&mut self, source: &str, points: &[LngLat]) -> Result<(), SurfaceError> {
        debug!(source, points = points.len(), "set point source");
        Ok(())
    }

    fn set_line_source(&mut self, source: &str, line: &[LngLat]) -> Result<(), SurfaceError> {
        debug!(source, points = line.len(), "set line source");
        Ok(())
    }

    fn add_layer(
        &mut self,
        layer: &str,
        source: &str,
        style: &LayerStyle,
    ) -> Result<(), SurfaceError> {
        debug!(layer, source, ?style, "add layer");
        Ok(())
    }

    fn remove_layer(&mut self, layer: &str) -> Result<(), SurfaceError> {
        debug!(layer, "remove layer");
        Ok(())
    }

    fn remove_source(&mut self, source: &str) -> Result<(), SurfaceError> {
        debug!(source, "remove source");
        Ok(())
    }

    fn upsert_marker(
        &mut self,
        marker: &str,
        position: LngLat,
        style: &MarkerStyle,
    ) -> Result<(), SurfaceError> {
        self.markers += 1;
        info!(marker, %position, size_px = style.size_px, total = self.markers, "upsert marker");
        Ok(())
    }

    fn move_marker(&mut self, marker: &str, position: LngLat) -> Result<(), SurfaceError> {
        debug!(marker, %position, "move marker");
        Ok(())
    }

    fn remove_marker(&mut self, marker: &str) -> Result<(), SurfaceError> {
        self.markers = self.markers.saturating_sub(1);
        debug!(marker, "remove marker");
        Ok(())
    }

    fn set_marker_visible(&mut self, marker: &str, visible: bool) -> Result<(), SurfaceError> {
        debug!(marker, visible, "set marker visibility");
        Ok(())
    }

    fn set_marker_highlighted(
        &mut self,
        marker: &str,
        highlighted: bool,
    ) -> Result<(), SurfaceError> {
        info!(marker, highlighted, "set marker highlight");
        Ok(())
    }

    fn set_marker_popup(&mut self, marker: &str, content: &PopupContent) -> Result<(), SurfaceError> {
        debug!(marker, title = %content.title, "set marker popup");
        Ok(())
    }

    fn fly_to(&mut self, center: LngLat, zoom: f64) -> Result<(), SurfaceError> {
        info!(%center, zoom, "fly to");
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: &BoundingBox, padding_px: u32) -> Result<(), SurfaceError> {
        info!(min = %bounds.min, max = %bounds.max, padding_px, "fit bounds");
        Ok(())
    }
}
