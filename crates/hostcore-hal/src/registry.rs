//! [`HardwareRegistry`] – table of attached devices and hot-plug source.
//!
//! The registry stores every attached [`Device`] keyed by its sysfs path.
//! Attaching or detaching a device updates the table and fires the matching
//! [`EventPayload`] on the [`EventBus`], where the host manager's hardware
//! handler picks it up.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hostcore_middleware::EventBus;
use hostcore_types::{Device, Event, EventPayload, HostError, PolicyGroup};
use tracing::debug;

use crate::policy::PolicyMatcher;

const EVENT_SOURCE: &str = "hostcore-hal::registry";

/// Central hardware device registry.
pub struct HardwareRegistry {
    devices: BTreeMap<PathBuf, Device>,
    bus: EventBus,
}

impl HardwareRegistry {
    /// Create an empty registry publishing to `bus`.
    pub fn new(bus: EventBus) -> Self {
        Self {
            devices: BTreeMap::new(),
            bus,
        }
    }

    /// Record `device` as attached and fire
    /// [`EventPayload::HardwareNewDevice`].
    ///
    /// A device already known under the same sysfs path is replaced and the
    /// event is fired again.  Returns the number of bus receivers notified.
    pub fn add_device(&mut self, device: Device) -> usize {
        debug!(device = %device.sysfs.display(), subsystem = %device.subsystem, "device attached");
        self.devices.insert(device.sysfs.clone(), device.clone());
        self.bus
            .fire_event(Event::new(EVENT_SOURCE, EventPayload::HardwareNewDevice(device)))
    }

    /// Forget the device at `sysfs` and fire
    /// [`EventPayload::HardwareRemoveDevice`].
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Hardware`] when no device is registered under
    /// `sysfs`; no event is fired in that case.
    pub fn remove_device(&mut self, sysfs: &Path) -> Result<Device, HostError> {
        let device = self.devices.remove(sysfs).ok_or_else(|| {
            HostError::Hardware(format!("device '{}' is not registered", sysfs.display()))
        })?;
        debug!(device = %device.sysfs.display(), "device detached");
        self.bus.fire_event(Event::new(
            EVENT_SOURCE,
            EventPayload::HardwareRemoveDevice(device.clone()),
        ));
        Ok(device)
    }

    pub fn get(&self, sysfs: &Path) -> Option<&Device> {
        self.devices.get(sysfs)
    }

    /// Find a device by its kernel name.
    pub fn find_by_name(&self, name: &str) -> Option<&Device> {
        self.devices.values().find(|d| d.name == name)
    }

    /// All attached devices, ordered by sysfs path.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Attached devices that `policy` classifies into `group`.
    pub fn filter_by_group<'a>(
        &'a self,
        policy: &'a dyn PolicyMatcher,
        group: PolicyGroup,
    ) -> impl Iterator<Item = &'a Device> + 'a {
        self.devices.values().filter(move |d| policy.is_match(group, d))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
