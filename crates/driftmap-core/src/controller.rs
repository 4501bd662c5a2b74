// ── Sync controller ──
//
// Orchestrates inbound events against the registry and the render
// surface. Pure orchestration: inputs are event payloads, outputs are
// surface calls plus registry mutations plus outbound events. Every
// fault is caught at the `handle` boundary and reported upstream as an
// `ErrorReport` -- one bad record never breaks the whole sync, and the
// next inbound event re-synchronizes state.

use std::collections::HashSet;

use chrono::Utc;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::SyncError;
use crate::jitter::JitterAnimator;
use crate::model::{
    BoundingBox, Device, DeviceId, DevicePayload, InboundEvent, LngLat, OutboundEvent,
};
use crate::registry::DeviceRegistry;
use crate::surface::{
    trail_point_marker_id, LayerStyle, MarkerStyle, RenderSurface, TRAIL_GLOW_LAYER,
    TRAIL_LINE_LAYER, TRAIL_POINTS_GLOW_LAYER, TRAIL_POINTS_LAYER, TRAIL_POINTS_SOURCE,
    TRAIL_SOURCE,
};

// ── Session state ────────────────────────────────────────────────

/// Per-map session state. Inbound events arriving before `Ready` are
/// dropped -- the server resends state after the ready acknowledgment,
/// which avoids unbounded buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
}

/// The one active trail, if any. Tracks how many per-point markers were
/// materialized so teardown can remove exactly those.
#[derive(Debug, Clone)]
struct ActiveTrail {
    device_id: DeviceId,
    point_marker_count: usize,
}

// ── SyncController ───────────────────────────────────────────────

/// Applies inbound events to the registry and the render surface in
/// order, with idempotent create-or-update semantics.
///
/// Owned exclusively by one map session; all mutation is
/// run-to-completion per event so no internal locking exists.
pub struct SyncController<S> {
    surface: S,
    registry: DeviceRegistry,
    config: SessionConfig,
    state: SessionState,
    highlighted: Option<DeviceId>,
    trail: Option<ActiveTrail>,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
}

impl<S: RenderSurface> SyncController<S> {
    pub fn new(
        config: SessionConfig,
        surface: S,
        outbound: mpsc::UnboundedSender<OutboundEvent>,
    ) -> Self {
        Self {
            surface,
            registry: DeviceRegistry::new(),
            config,
            state: SessionState::Uninitialized,
            highlighted: None,
            trail: None,
            outbound,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn highlighted(&self) -> Option<&DeviceId> {
        self.highlighted.as_ref()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Acknowledge that the surface finished loading.
    ///
    /// The first acknowledgment on a loaded surface transitions the
    /// session to `Ready` and emits `SurfaceReady`; returns whether the
    /// transition happened. An acknowledgment while the surface still
    /// reports unloaded (e.g. a degraded [`NoopSurface`](crate::surface::NoopSurface))
    /// is ignored, leaving every subsequent call a safe no-op.
    pub fn surface_ready(&mut self) -> bool {
        if self.state == SessionState::Ready {
            return false;
        }
        if !self.surface.is_loaded() {
            warn!("ready acknowledgment on an unloaded surface, staying uninitialized");
            return false;
        }
        self.state = SessionState::Ready;
        self.emit(OutboundEvent::SurfaceReady);
        debug!("session ready");
        true
    }

    // ── Event entry point ────────────────────────────────────────

    /// Apply one inbound event. Never fails past this boundary: faults
    /// are logged and reported upstream as `ErrorReport`.
    pub fn handle(&mut self, event: InboundEvent) {
        if self.state != SessionState::Ready {
            debug!(?event, "dropping inbound event before surface ready");
            return;
        }

        let result = match event {
            InboundEvent::InitialBatch { devices } => self.on_initial_batch(devices),
            InboundEvent::IncrementalUpdate { devices } => self.on_incremental_update(devices),
            InboundEvent::Highlight { device_id } => self.on_highlight(device_id),
            InboundEvent::TrailUpdate { device_id, trail } => {
                self.on_trail_update(device_id, trail)
            }
            InboundEvent::ClearTrail => self.on_clear_trail(),
            InboundEvent::Filter {
                device_ids,
                show_all,
            } => self.on_filter(device_ids, show_all),
        };

        if let Err(error) = result {
            warn!(error = %error, "event handling failed");
            self.report(&error);
        }
    }

    /// Host-forwarded marker click.
    pub fn marker_clicked(&self, device_id: DeviceId) {
        self.emit(OutboundEvent::DeviceSelected { device_id });
    }

    // ── Operations ───────────────────────────────────────────────

    /// Full reset: replace every marker with the given batch, then fit
    /// the viewport. Idempotent -- old markers, trail, and highlight are
    /// fully torn down, never layered.
    fn on_initial_batch(&mut self, payloads: Vec<DevicePayload>) -> Result<(), SyncError> {
        let devices = self.validate_batch(payloads);

        self.teardown_trail()?;
        self.highlighted = None;

        let stale: Vec<String> = self
            .registry
            .ids()
            .map(|id| id.as_str().to_owned())
            .collect();
        for marker in &stale {
            self.surface.remove_marker(marker)?;
        }

        self.registry.reset_all(devices);

        let style = MarkerStyle::device(&self.config.theme);
        let mut positions = Vec::with_capacity(self.registry.len());
        for (id, marker) in self.registry.iter() {
            self.surface
                .upsert_marker(id.as_str(), marker.displayed, &style)?;
            self.surface
                .set_marker_popup(id.as_str(), &marker.device.popup())?;
            positions.push(marker.displayed);
        }

        match positions.as_slice() {
            [] => {}
            [only] => self.surface.fly_to(*only, self.config.detail_zoom)?,
            many => {
                if let Some(bounds) = BoundingBox::from_points(many) {
                    self.surface
                        .fit_bounds(&bounds, self.config.fit_padding_px)?;
                }
            }
        }

        debug!(devices = self.registry.len(), "initial batch applied");
        Ok(())
    }

    /// Apply an incremental update: move known markers, create unknown
    /// ones, refresh popups. No viewport change.
    fn on_incremental_update(&mut self, payloads: Vec<DevicePayload>) -> Result<(), SyncError> {
        let devices = self.validate_batch(payloads);
        let style = MarkerStyle::device(&self.config.theme);

        for device in devices {
            let marker = device.id.as_str().to_owned();
            let position = device.position;
            let popup = device.popup();

            if self.registry.upsert(device) {
                self.surface.upsert_marker(&marker, position, &style)?;
            } else {
                self.surface.move_marker(&marker, position)?;
            }
            self.surface.set_marker_popup(&marker, &popup)?;
        }
        Ok(())
    }

    /// Move the exclusive highlight, or clear it. An unknown id clears
    /// the previous highlight and records none -- not an error.
    fn on_highlight(&mut self, target: Option<DeviceId>) -> Result<(), SyncError> {
        if self.config.exclusive_highlight {
            if let Some(prev) = self.highlighted.take() {
                if let Some(marker) = self.registry.get_mut(&prev) {
                    marker.highlighted = false;
                    self.surface.set_marker_highlighted(prev.as_str(), false)?;
                }
            }
        }

        match target {
            Some(id) if self.registry.contains(&id) => {
                if let Some(marker) = self.registry.get_mut(&id) {
                    marker.highlighted = true;
                }
                self.surface.set_marker_highlighted(id.as_str(), true)?;
                self.highlighted = Some(id);
            }
            Some(id) => {
                debug!(device_id = %id, "highlight for unknown device, clearing");
                self.highlighted = None;
            }
            None => self.highlighted = None,
        }
        Ok(())
    }

    /// Draw or update the trail for one device.
    ///
    /// Fewer than 2 valid points is not renderable as a line and is
    /// ignored. A trail for a different device is torn down first --
    /// never two simultaneous trails. For the same device the sources
    /// are updated in place so the layers never flicker.
    fn on_trail_update(
        &mut self,
        device_id: DeviceId,
        points: Vec<LngLat>,
    ) -> Result<(), SyncError> {
        let valid: Vec<LngLat> = points.into_iter().filter(LngLat::is_valid).collect();
        if valid.len() < 2 {
            debug!(device_id = %device_id, points = valid.len(), "trail too short, ignoring");
            return Ok(());
        }

        let same_device = self
            .trail
            .as_ref()
            .is_some_and(|t| t.device_id == device_id);
        if !same_device {
            self.teardown_trail()?;
        }

        self.surface.set_line_source(TRAIL_SOURCE, &valid)?;
        self.surface.set_point_source(TRAIL_POINTS_SOURCE, &valid)?;

        if !same_device {
            self.surface.add_layer(
                TRAIL_GLOW_LAYER,
                TRAIL_SOURCE,
                &LayerStyle::trail_glow(&self.config.theme),
            )?;
            self.surface.add_layer(
                TRAIL_LINE_LAYER,
                TRAIL_SOURCE,
                &LayerStyle::trail_line(&self.config.theme),
            )?;
            self.surface.add_layer(
                TRAIL_POINTS_GLOW_LAYER,
                TRAIL_POINTS_SOURCE,
                &LayerStyle::trail_points_glow(&self.config.theme),
            )?;
            self.surface.add_layer(
                TRAIL_POINTS_LAYER,
                TRAIL_POINTS_SOURCE,
                &LayerStyle::trail_points(&self.config.theme),
            )?;
        }

        // Rebuild the per-point markers. Index 0 is the live position,
        // already represented by the device marker.
        if let Some(prev) = self.trail.take() {
            for index in 1..prev.point_marker_count {
                self.surface.remove_marker(&trail_point_marker_id(index))?;
            }
        }
        for (index, point) in valid.iter().enumerate().skip(1) {
            let style = MarkerStyle::trail_point(&self.config.theme, index);
            self.surface
                .upsert_marker(&trail_point_marker_id(index), *point, &style)?;
        }

        self.trail = Some(ActiveTrail {
            device_id,
            point_marker_count: valid.len(),
        });
        Ok(())
    }

    /// Tear down the active trail's layers, sources, and point markers.
    /// Silent no-op when no trail exists.
    fn on_clear_trail(&mut self) -> Result<(), SyncError> {
        self.teardown_trail()
    }

    /// Hide every marker not in the set, show the members (everything
    /// with `show_all`), optionally refit the viewport to the shown set.
    fn on_filter(&mut self, device_ids: Vec<DeviceId>, show_all: bool) -> Result<(), SyncError> {
        let allowed: HashSet<DeviceId> = device_ids.into_iter().collect();

        let mut visible_positions = Vec::new();
        for (id, marker) in self.registry.iter_mut() {
            let show = show_all || allowed.contains(id);
            marker.visible = show;
            self.surface.set_marker_visible(id.as_str(), show)?;
            if show {
                visible_positions.push(marker.displayed);
            }
        }

        if self.config.fit_on_filter {
            if let Some(bounds) = BoundingBox::from_points(&visible_positions) {
                self.surface
                    .fit_bounds(&bounds, self.config.fit_padding_px)?;
            }
        }
        Ok(())
    }

    // ── Jitter ───────────────────────────────────────────────────

    /// One animator tick: random-walk every registered device and push
    /// the new position to the surface. No-op before `Ready`.
    pub fn jitter_tick<R: Rng>(&mut self, animator: &mut JitterAnimator<R>) {
        if self.state != SessionState::Ready {
            return;
        }

        let broadcast = animator.config().broadcast_positions;
        let outbound = self.outbound.clone();
        for (id, marker) in self.registry.iter_mut() {
            let next = animator.displace(marker.base);
            // Replace the base so drift accumulates -- a random walk,
            // not noise around an anchor.
            marker.base = next;
            marker.displayed = next;

            if let Err(error) = self.surface.move_marker(id.as_str(), next) {
                warn!(error = %error, device_id = %id, "jitter move failed");
                let _ = outbound.send(OutboundEvent::ErrorReport {
                    message: error.to_string(),
                });
                continue;
            }
            if broadcast {
                let _ = outbound.send(OutboundEvent::DevicePositionChanged {
                    device_id: id.clone(),
                    lon: next.lon,
                    lat: next.lat,
                });
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────

    /// Validate a batch record-by-record: bad records are skipped and
    /// reported, never aborting the rest of the batch.
    fn validate_batch(&self, payloads: Vec<DevicePayload>) -> Vec<Device> {
        let now = Utc::now();
        let mut devices = Vec::with_capacity(payloads.len());
        for payload in payloads {
            match payload.into_device(now) {
                Ok(device) => devices.push(device),
                Err(error) => {
                    warn!(error = %error, "skipping malformed device record");
                    self.report(&error);
                }
            }
        }
        devices
    }

    fn teardown_trail(&mut self) -> Result<(), SyncError> {
        let Some(trail) = self.trail.take() else {
            return Ok(());
        };

        for index in 1..trail.point_marker_count {
            self.surface.remove_marker(&trail_point_marker_id(index))?;
        }
        for layer in [
            TRAIL_POINTS_LAYER,
            TRAIL_POINTS_GLOW_LAYER,
            TRAIL_LINE_LAYER,
            TRAIL_GLOW_LAYER,
        ] {
            self.surface.remove_layer(layer)?;
        }
        for source in [TRAIL_POINTS_SOURCE, TRAIL_SOURCE] {
            self.surface.remove_source(source)?;
        }

        debug!(device_id = %trail.device_id, "trail torn down");
        Ok(())
    }

    fn report(&self, error: &SyncError) {
        self.emit(OutboundEvent::ErrorReport {
            message: error.to_string(),
        });
    }

    fn emit(&self, event: OutboundEvent) {
        // A dropped receiver just means the host stopped listening.
        let _ = self.outbound.send(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::surface::testing::{RecordingSurface, SurfaceCall};
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn controller() -> (
        SyncController<RecordingSurface>,
        UnboundedReceiver<OutboundEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut ctrl = SyncController::new(SessionConfig::default(), RecordingSurface::new(), tx);
        assert!(ctrl.surface_ready());
        (ctrl, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<OutboundEvent>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    fn batch(records: &[(&str, f64, f64)]) -> InboundEvent {
        InboundEvent::InitialBatch {
            devices: payloads(records),
        }
    }

    fn update(records: &[(&str, f64, f64)]) -> InboundEvent {
        InboundEvent::IncrementalUpdate {
            devices: payloads(records),
        }
    }

    fn payloads(records: &[(&str, f64, f64)]) -> Vec<DevicePayload> {
        records
            .iter()
            .map(|(id, lon, lat)| {
                serde_json::from_value(serde_json::json!({
                    "device_id": id, "lon": lon, "lat": lat,
                }))
                .unwrap()
            })
            .collect()
    }

    fn position(ctrl: &SyncController<RecordingSurface>, id: &str) -> LngLat {
        ctrl.registry().get(&DeviceId::from(id)).unwrap().displayed
    }

    // ── Lifecycle ────────────────────────────────────────────────

    #[test]
    fn surface_ready_emits_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ctrl = SyncController::new(SessionConfig::default(), RecordingSurface::new(), tx);

        assert!(ctrl.surface_ready());
        assert!(!ctrl.surface_ready());
        assert_eq!(drain(&mut rx), vec![OutboundEvent::SurfaceReady]);
    }

    #[test]
    fn events_before_ready_are_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ctrl = SyncController::new(SessionConfig::default(), RecordingSurface::new(), tx);

        ctrl.handle(batch(&[("d1", 10.0, 20.0)]));
        assert!(ctrl.registry().is_empty());
        assert!(ctrl.surface.calls.is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn ready_ack_on_unloaded_surface_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut ctrl =
            SyncController::new(SessionConfig::default(), crate::surface::NoopSurface, tx);
        assert!(!ctrl.surface_ready());
        assert_eq!(ctrl.state(), SessionState::Uninitialized);
    }

    // ── Initial batch ────────────────────────────────────────────

    #[test]
    fn initial_batch_registers_and_fits_viewport() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("d1", 10.0, 20.0), ("d2", -5.0, 15.0)]));

        assert_eq!(ctrl.registry().len(), 2);
        assert_eq!(position(&ctrl, "d1"), LngLat::new(10.0, 20.0));
        assert!(!ctrl.registry().get(&DeviceId::from("d1")).unwrap().highlighted);

        let fitted = ctrl.surface.calls.iter().any(|c| {
            matches!(c, SurfaceCall::FitBounds { bounds, .. }
                if bounds.min == LngLat::new(-5.0, 15.0) && bounds.max == LngLat::new(10.0, 20.0))
        });
        assert!(fitted, "viewport not fitted: {:?}", ctrl.surface.calls);
    }

    #[test]
    fn initial_batch_with_single_device_flies_to_it() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("d1", 10.0, 20.0)]));

        assert!(ctrl.surface.calls.contains(&SurfaceCall::FlyTo {
            center: LngLat::new(10.0, 20.0),
            zoom: 12.0,
        }));
    }

    #[test]
    fn second_initial_batch_replaces_not_layers() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)]));
        ctrl.surface.take_calls();

        ctrl.handle(batch(&[("a", 3.0, 3.0)]));

        assert_eq!(ctrl.registry().len(), 1);
        assert!(!ctrl.registry().contains(&DeviceId::from("b")));
        // Both stale markers were removed from the surface first.
        let calls = ctrl.surface.take_calls();
        assert!(calls.contains(&SurfaceCall::RemoveMarker { marker: "a".into() }));
        assert!(calls.contains(&SurfaceCall::RemoveMarker { marker: "b".into() }));
    }

    #[test]
    fn malformed_record_is_skipped_not_fatal() {
        let (mut ctrl, mut rx) = controller();
        let devices: Vec<DevicePayload> = serde_json::from_value(serde_json::json!([
            {"device_id": "good", "lon": 1.0, "lat": 2.0},
            {"device_id": "bad", "lon": 3.0},
        ]))
        .unwrap();
        ctrl.handle(InboundEvent::InitialBatch { devices });

        assert_eq!(ctrl.registry().len(), 1);
        assert!(ctrl.registry().contains(&DeviceId::from("good")));

        let reports: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, OutboundEvent::ErrorReport { .. }))
            .collect();
        assert_eq!(reports.len(), 1);
    }

    // ── Incremental updates ──────────────────────────────────────

    #[test]
    fn last_write_wins_per_device() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("x", 0.0, 0.0)]));
        ctrl.handle(update(&[("x", 1.0, 1.0)]));
        ctrl.handle(update(&[("x", 2.0, 2.0), ("y", 9.0, 9.0)]));
        ctrl.handle(update(&[("x", 5.0, 6.0)]));

        assert_eq!(position(&ctrl, "x"), LngLat::new(5.0, 6.0));
        assert_eq!(position(&ctrl, "y"), LngLat::new(9.0, 9.0));
    }

    #[test]
    fn incremental_update_creates_unknown_devices() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(update(&[("new", 4.0, 4.0)]));

        assert_eq!(ctrl.registry().len(), 1);
        assert!(ctrl.surface.calls.iter().any(|c| {
            matches!(c, SurfaceCall::UpsertMarker { marker, .. } if marker == "new")
        }));
        // No viewport change on incremental updates.
        assert!(!ctrl
            .surface
            .calls
            .iter()
            .any(|c| matches!(c, SurfaceCall::FitBounds { .. } | SurfaceCall::FlyTo { .. })));
    }

    #[test]
    fn incremental_update_moves_known_devices_and_refreshes_popup() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("x", 0.0, 0.0)]));
        ctrl.surface.take_calls();

        ctrl.handle(update(&[("x", 1.0, 2.0)]));
        let calls = ctrl.surface.take_calls();
        assert_eq!(
            calls,
            vec![
                SurfaceCall::MoveMarker {
                    marker: "x".into(),
                    position: LngLat::new(1.0, 2.0),
                },
                SurfaceCall::SetMarkerPopup {
                    marker: "x".into(),
                    title: "x".into(),
                },
            ]
        );
    }

    // ── Highlight ────────────────────────────────────────────────

    #[test]
    fn highlight_is_exclusive() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)]));

        ctrl.handle(InboundEvent::Highlight {
            device_id: Some(DeviceId::from("a")),
        });
        ctrl.handle(InboundEvent::Highlight {
            device_id: Some(DeviceId::from("b")),
        });

        assert!(!ctrl.registry().get(&DeviceId::from("a")).unwrap().highlighted);
        assert!(ctrl.registry().get(&DeviceId::from("b")).unwrap().highlighted);
        assert_eq!(ctrl.highlighted(), Some(&DeviceId::from("b")));
    }

    #[test]
    fn highlight_unknown_clears_previous() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("a", 1.0, 1.0)]));

        ctrl.handle(InboundEvent::Highlight {
            device_id: Some(DeviceId::from("a")),
        });
        ctrl.handle(InboundEvent::Highlight {
            device_id: Some(DeviceId::from("nope")),
        });

        assert!(!ctrl.registry().get(&DeviceId::from("a")).unwrap().highlighted);
        assert_eq!(ctrl.highlighted(), None);
    }

    #[test]
    fn non_exclusive_highlight_keeps_previous_styling() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = SessionConfig {
            exclusive_highlight: false,
            ..Default::default()
        };
        let mut ctrl = SyncController::new(config, RecordingSurface::new(), tx);
        ctrl.surface_ready();
        ctrl.handle(batch(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)]));

        ctrl.handle(InboundEvent::Highlight {
            device_id: Some(DeviceId::from("a")),
        });
        ctrl.handle(InboundEvent::Highlight {
            device_id: Some(DeviceId::from("b")),
        });

        assert!(ctrl.registry().get(&DeviceId::from("a")).unwrap().highlighted);
        assert!(ctrl.registry().get(&DeviceId::from("b")).unwrap().highlighted);
    }

    // ── Trail ────────────────────────────────────────────────────

    fn trail_event(id: &str, points: &[(f64, f64)]) -> InboundEvent {
        InboundEvent::TrailUpdate {
            device_id: DeviceId::from(id),
            trail: points.iter().map(|&(lon, lat)| LngLat::new(lon, lat)).collect(),
        }
    }

    #[test]
    fn single_point_trail_is_a_noop() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("a", 1.0, 1.0)]));
        ctrl.surface.take_calls();

        ctrl.handle(trail_event("a", &[(1.0, 1.0)]));
        assert!(ctrl.surface.calls.is_empty());
    }

    #[test]
    fn first_trail_creates_sources_layers_and_fading_point_markers() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("a", 1.0, 1.0)]));
        ctrl.surface.take_calls();

        ctrl.handle(trail_event("a", &[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]));
        let calls = ctrl.surface.take_calls();

        let layers: Vec<&str> = calls
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::AddLayer { layer, .. } => Some(layer.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            layers,
            vec![
                TRAIL_GLOW_LAYER,
                TRAIL_LINE_LAYER,
                TRAIL_POINTS_GLOW_LAYER,
                TRAIL_POINTS_LAYER
            ]
        );

        // Point markers for index 1.. only, fading with age.
        let markers: Vec<(&str, f64, f64)> = calls
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::UpsertMarker {
                    marker,
                    size_px,
                    opacity,
                    ..
                } => Some((marker.as_str(), *size_px, *opacity)),
                _ => None,
            })
            .collect();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].0, "trail-point-1");
        assert_eq!(markers[1].0, "trail-point-2");
        assert!(markers[1].1 <= markers[0].1);
        assert!(markers[1].2 <= markers[0].2);
    }

    #[test]
    fn same_device_trail_update_reuses_layers() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("a", 1.0, 1.0)]));
        ctrl.handle(trail_event("a", &[(1.0, 1.0), (2.0, 2.0)]));
        ctrl.surface.take_calls();

        ctrl.handle(trail_event("a", &[(1.5, 1.5), (2.0, 2.0), (3.0, 3.0)]));
        let calls = ctrl.surface.take_calls();

        assert!(!calls.iter().any(|c| matches!(c, SurfaceCall::AddLayer { .. })));
        assert!(!calls.iter().any(|c| matches!(c, SurfaceCall::RemoveLayer { .. })));
        assert!(calls.iter().any(|c| {
            matches!(c, SurfaceCall::SetLineSource { source, line }
                if source == TRAIL_SOURCE && line.len() == 3)
        }));
    }

    #[test]
    fn switching_device_tears_old_trail_down_first() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)]));
        ctrl.handle(trail_event("a", &[(1.0, 1.0), (2.0, 2.0)]));
        ctrl.surface.take_calls();

        ctrl.handle(trail_event("b", &[(5.0, 5.0), (6.0, 6.0)]));
        let calls = ctrl.surface.take_calls();

        let first_removal = calls
            .iter()
            .position(|c| matches!(c, SurfaceCall::RemoveSource { .. }));
        let first_creation = calls
            .iter()
            .position(|c| matches!(c, SurfaceCall::SetLineSource { .. }));
        assert!(first_removal.unwrap() < first_creation.unwrap());
    }

    #[test]
    fn clear_trail_without_trail_is_a_noop() {
        let (mut ctrl, mut rx) = controller();
        ctrl.handle(batch(&[("a", 1.0, 1.0)]));
        ctrl.surface.take_calls();
        drain(&mut rx);

        ctrl.handle(InboundEvent::ClearTrail);
        assert!(ctrl.surface.calls.is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn clear_trail_removes_everything() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("a", 1.0, 1.0)]));
        ctrl.handle(trail_event("a", &[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]));
        ctrl.surface.take_calls();

        ctrl.handle(InboundEvent::ClearTrail);
        let calls = ctrl.surface.take_calls();

        assert!(calls.contains(&SurfaceCall::RemoveMarker {
            marker: "trail-point-1".into()
        }));
        assert!(calls.contains(&SurfaceCall::RemoveSource {
            source: TRAIL_SOURCE.into()
        }));
        assert!(calls.contains(&SurfaceCall::RemoveSource {
            source: TRAIL_POINTS_SOURCE.into()
        }));
        assert_eq!(
            calls
                .iter()
                .filter(|c| matches!(c, SurfaceCall::RemoveLayer { .. }))
                .count(),
            4
        );
    }

    // ── Filter ───────────────────────────────────────────────────

    #[test]
    fn filter_hides_everything_not_listed() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("a", 1.0, 1.0), ("b", 2.0, 2.0), ("c", 3.0, 3.0)]));
        ctrl.surface.take_calls();

        ctrl.handle(InboundEvent::Filter {
            device_ids: vec![DeviceId::from("b")],
            show_all: false,
        });

        assert!(!ctrl.registry().get(&DeviceId::from("a")).unwrap().visible);
        assert!(ctrl.registry().get(&DeviceId::from("b")).unwrap().visible);
        let calls = ctrl.surface.take_calls();
        assert!(calls.contains(&SurfaceCall::SetMarkerVisible {
            marker: "a".into(),
            visible: false
        }));
        // Refit covers only the visible set.
        assert!(calls.iter().any(|c| {
            matches!(c, SurfaceCall::FitBounds { bounds, .. }
                if bounds.min == LngLat::new(2.0, 2.0) && bounds.max == LngLat::new(2.0, 2.0))
        }));
    }

    #[test]
    fn show_all_restores_every_marker() {
        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)]));
        ctrl.handle(InboundEvent::Filter {
            device_ids: vec![DeviceId::from("a")],
            show_all: false,
        });

        ctrl.handle(InboundEvent::Filter {
            device_ids: vec![],
            show_all: true,
        });
        assert!(ctrl.registry().iter().all(|(_, m)| m.visible));
    }

    // ── Failure isolation ────────────────────────────────────────

    #[test]
    fn surface_failure_becomes_error_report() {
        let (mut ctrl, mut rx) = controller();
        drain(&mut rx);
        ctrl.surface.fail_drawing = true;

        ctrl.handle(batch(&[("a", 1.0, 1.0)]));

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, OutboundEvent::ErrorReport { .. })));
    }

    #[test]
    fn marker_click_emits_device_selected() {
        let (ctrl, mut rx) = controller();
        ctrl.marker_clicked(DeviceId::from("d1"));
        let events = drain(&mut rx);
        assert!(events.contains(&OutboundEvent::DeviceSelected {
            device_id: DeviceId::from("d1")
        }));
    }

    // ── Jitter ───────────────────────────────────────────────────

    #[test]
    fn jitter_walk_is_cumulative_and_bounded_per_tick() {
        use rand::rngs::SmallRng;
        use rand::SeedableRng;

        let (mut ctrl, _rx) = controller();
        ctrl.handle(batch(&[("d1", 10.0, 20.0)]));

        let config = crate::config::JitterConfig::default();
        let mut animator = JitterAnimator::new(SmallRng::seed_from_u64(1), config);
        let origin = position(&ctrl, "d1");

        ctrl.jitter_tick(&mut animator);
        let after_one = position(&ctrl, "d1");
        ctrl.jitter_tick(&mut animator);
        let after_two = position(&ctrl, "d1");

        // Each tick displaces from the *new* base, within the band.
        let step1 = after_one.distance_deg(&origin);
        let step2 = after_two.distance_deg(&after_one);
        assert!(step1 >= config.min_magnitude_deg && step1 <= config.max_magnitude_deg);
        assert!(step2 >= config.min_magnitude_deg && step2 <= config.max_magnitude_deg);
        assert_ne!(after_two, after_one);

        // Base drifted with the displayed position -- a random walk.
        let marker = ctrl.registry().get(&DeviceId::from("d1")).unwrap();
        assert_eq!(marker.base, marker.displayed);
        assert_eq!(marker.base, after_two);
    }

    #[test]
    fn jitter_broadcasts_position_changes_when_configured() {
        use rand::rngs::SmallRng;
        use rand::SeedableRng;

        let (mut ctrl, mut rx) = controller();
        ctrl.handle(batch(&[("d1", 10.0, 20.0)]));
        drain(&mut rx);

        let mut animator = JitterAnimator::new(
            SmallRng::seed_from_u64(1),
            crate::config::JitterConfig::default(),
        );
        ctrl.jitter_tick(&mut animator);

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, OutboundEvent::DevicePositionChanged { device_id, .. }
                if device_id.as_str() == "d1")));

        // And not when the flag is off.
        let mut quiet = JitterAnimator::new(
            SmallRng::seed_from_u64(2),
            crate::config::JitterConfig {
                broadcast_positions: false,
                ..Default::default()
            },
        );
        ctrl.jitter_tick(&mut quiet);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn jitter_is_a_noop_before_ready() {
        use rand::rngs::SmallRng;
        use rand::SeedableRng;

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut ctrl = SyncController::new(SessionConfig::default(), RecordingSurface::new(), tx);
        let mut animator = JitterAnimator::new(
            SmallRng::seed_from_u64(1),
            crate::config::JitterConfig::default(),
        );
        ctrl.jitter_tick(&mut animator);
        assert!(ctrl.surface.calls.is_empty());
    }

    // ── End-to-end scenario ──────────────────────────────────────

    #[test]
    fn detail_view_scenario() {
        let (mut ctrl, mut rx) = controller();
        assert!(ctrl.registry().is_empty());

        ctrl.handle(batch(&[("d1", 10.0, 20.0)]));
        let marker = ctrl.registry().get(&DeviceId::from("d1")).unwrap();
        assert_eq!(marker.displayed, LngLat::new(10.0, 20.0));
        assert!(!marker.highlighted);

        ctrl.handle(InboundEvent::Highlight {
            device_id: Some(DeviceId::from("d1")),
        });
        assert!(ctrl.registry().get(&DeviceId::from("d1")).unwrap().highlighted);

        drain(&mut rx);
        ctrl.handle(InboundEvent::ClearTrail);
        assert!(drain(&mut rx).is_empty());
    }
}
