// ── Map session ──
//
// The host-facing owner of one map's sync state. Wraps the controller
// in a mutex so inbound event handling and the jitter tick serialize
// run-to-completion, and owns the jitter background task: the interval
// starts when the session becomes ready and is cancelled on teardown,
// on every exit path -- a tick must never outlive its map.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::SessionConfig;
use crate::controller::SyncController;
use crate::jitter::JitterAnimator;
use crate::model::{DeviceId, InboundEvent, OutboundEvent};
use crate::registry::MarkerState;
use crate::surface::RenderSurface;

/// One live map session: controller, outbound channel, jitter task.
pub struct MapSession<S> {
    controller: Arc<Mutex<SyncController<S>>>,
    config: SessionConfig,
    cancel: CancellationToken,
    jitter_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: RenderSurface + Send + 'static> MapSession<S> {
    /// Create a session over the given surface. Returns the session and
    /// the receiving end of the outbound event channel.
    pub fn new(config: SessionConfig, surface: S) -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let controller = SyncController::new(config.clone(), surface, outbound_tx);

        let session = Self {
            controller: Arc::new(Mutex::new(controller)),
            config,
            cancel: CancellationToken::new(),
            jitter_handle: Mutex::new(None),
        };
        (session, outbound_rx)
    }

    /// Forward the surface's load acknowledgment. The first successful
    /// acknowledgment starts the jitter task.
    pub async fn surface_ready(&self) {
        let became_ready = self.controller.lock().await.surface_ready();
        if became_ready && self.config.jitter.enabled() {
            let handle = tokio::spawn(jitter_task(
                Arc::clone(&self.controller),
                self.config.jitter,
                self.cancel.clone(),
            ));
            *self.jitter_handle.lock().await = Some(handle);
        }
    }

    /// Apply one inbound event.
    pub async fn handle(&self, event: InboundEvent) {
        self.controller.lock().await.handle(event);
    }

    /// Forward a marker click from the host.
    pub async fn marker_clicked(&self, device_id: DeviceId) {
        self.controller.lock().await.marker_clicked(device_id);
    }

    /// Snapshot of one device's marker state.
    pub async fn marker(&self, device_id: &DeviceId) -> Option<MarkerState> {
        self.controller
            .lock()
            .await
            .registry()
            .get(device_id)
            .cloned()
    }

    pub async fn device_count(&self) -> usize {
        self.controller.lock().await.registry().len()
    }

    /// Tear the session down: cancel the jitter interval and join the
    /// task before the surface handle is released.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.jitter_handle.lock().await.take() {
            let _ = handle.await;
        }
        debug!("session shut down");
    }
}

impl<S> Drop for MapSession<S> {
    fn drop(&mut self) {
        // Cancellation is idempotent; this covers exit paths that never
        // reached `shutdown()`.
        self.cancel.cancel();
    }
}

// ── Background task ──────────────────────────────────────────────

/// Tick the jitter walk until cancelled.
async fn jitter_task<S: RenderSurface + Send + 'static>(
    controller: Arc<Mutex<SyncController<S>>>,
    config: crate::config::JitterConfig,
    cancel: CancellationToken,
) {
    let mut animator = JitterAnimator::new(SmallRng::from_entropy(), config);
    let mut interval = tokio::time::interval(config.interval);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                controller.lock().await.jitter_tick(&mut animator);
            }
        }
    }
    debug!("jitter task stopped");
}
