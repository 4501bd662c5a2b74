// ── Device registry ──
//
// In-memory mapping from device id to marker state. Single owner, all
// mutations funnel through here; insertion order is preserved so a full
// reset replays devices in the order the server sent them.

use indexmap::IndexMap;

use crate::model::{Device, DeviceId, LngLat};

/// Visual state of one registered device.
///
/// `displayed` may differ from `base` only through the jitter walk;
/// a real server update overwrites both.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerState {
    pub device: Device,
    /// True position as of the last server update (or jitter drift).
    pub base: LngLat,
    /// Position currently shown on the surface.
    pub displayed: LngLat,
    pub highlighted: bool,
    pub visible: bool,
}

impl MarkerState {
    fn new(device: Device) -> Self {
        let position = device.position;
        Self {
            device,
            base: position,
            displayed: position,
            highlighted: false,
            visible: true,
        }
    }
}

/// One `MarkerState` per known device id, insertion-ordered.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    markers: IndexMap<DeviceId, MarkerState>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a marker for a new device, or update an existing one in
    /// place. Returns `true` if the id was new.
    ///
    /// An update resets both `base` and `displayed` to the reported
    /// position (jitter drift never survives a real update) but keeps
    /// the highlight/visibility flags.
    pub fn upsert(&mut self, device: Device) -> bool {
        match self.markers.get_mut(&device.id) {
            Some(marker) => {
                marker.base = device.position;
                marker.displayed = device.position;
                marker.device = device;
                false
            }
            None => {
                self.markers
                    .insert(device.id.clone(), MarkerState::new(device));
                true
            }
        }
    }

    pub fn get(&self, id: &DeviceId) -> Option<&MarkerState> {
        self.markers.get(id)
    }

    pub fn get_mut(&mut self, id: &DeviceId) -> Option<&mut MarkerState> {
        self.markers.get_mut(id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.markers.contains_key(id)
    }

    /// All registered ids, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.markers.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &MarkerState)> {
        self.markers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&DeviceId, &mut MarkerState)> {
        self.markers.iter_mut()
    }

    /// Remove a single marker. Only used while resetting -- devices are
    /// never deleted individually in normal operation.
    pub fn remove(&mut self, id: &DeviceId) -> Option<MarkerState> {
        self.markers.shift_remove(id)
    }

    /// Replace the whole registry with exactly these devices. No partial
    /// state is ever observable: the new map is built first, then swapped.
    pub fn reset_all(&mut self, devices: Vec<Device>) {
        let mut next = IndexMap::with_capacity(devices.len());
        for device in devices {
            next.insert(device.id.clone(), MarkerState::new(device));
        }
        self.markers = next;
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}
