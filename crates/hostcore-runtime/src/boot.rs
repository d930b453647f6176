//! [`HostRuntime`] – wires bus, hardware registry, host and manager.
//!
//! The runtime owns one of each piece and hands the host manager the
//! collaborators of a [`SimHost`] built from a [`SimProfile`].  Call
//! [`HostRuntime::boot`] from inside a Tokio runtime; it performs the
//! manager's one-shot startup sequence.

use std::sync::Arc;

use hostcore_hal::{HardwareRegistry, SimHost, SimProfile};
use hostcore_kernel::HostManager;
use hostcore_middleware::EventBus;
use tracing::info;

pub struct HostRuntime {
    pub bus: EventBus,
    pub registry: HardwareRegistry,
    pub host: SimHost,
    pub manager: Arc<HostManager>,
}

impl HostRuntime {
    /// Assemble all components without loading anything.
    ///
    /// `bus_capacity` must be non-zero.
    pub fn new(profile: &SimProfile, bus_capacity: usize) -> Self {
        let bus = EventBus::new(bus_capacity);
        let host = SimHost::from_profile(profile);
        let manager = Arc::new(HostManager::new(host.components(), bus.clone()));
        Self {
            registry: HardwareRegistry::new(bus.clone()),
            bus,
            host,
            manager,
        }
    }

    /// Assemble and run the startup sequence.
    pub async fn boot(profile: &SimProfile, bus_capacity: usize) -> Self {
        let runtime = Self::new(profile, bus_capacity);
        runtime.manager.load().await;
        info!(features = ?runtime.manager.features(), "host runtime booted");
        runtime
    }
}
