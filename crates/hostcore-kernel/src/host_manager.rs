//! [`HostManager`] – reload protocol and startup sequence.
//!
//! # Reload
//!
//! [`HostManager::reload`] refreshes every subsystem in a fixed order:
//!
//! 1. host info – always; a failure here is returned to the caller
//! 2. services – only when the service manager is connected
//! 3. network – only when the network manager is connected
//! 4. OS agent – only when the agent is connected
//! 5. sound – always; any failure is logged and dropped
//!
//! A step whose connection is down is *skipped*, which is not an error.  A
//! present subsystem that fails in steps 2–5 is logged and recorded in the
//! [`ReloadReport`], and the remaining steps still run.  Once all steps ran
//! the capability cache is invalidated.
//!
//! # Startup
//!
//! [`HostManager::load`] runs once: a best-effort reload, registration of the
//! hardware event handler on both hot-plug topics, and loading of the
//! security profile.  None of these can abort startup.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use hostcore_hal::{HostComponents, SecurityProfile, Subsystem};
use hostcore_middleware::{BusEvent, DeviceHandler, EventBus, Listener};
use hostcore_types::{HostError, HostFeature};
use tracing::{debug, info, instrument, warn};

use crate::capability_manager::CapabilityManager;
use crate::hardware_events::HardwareEventHandler;

/// Result of a single reload step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StepOutcome {
    /// The subsystem was refreshed successfully.
    Refreshed,
    /// The subsystem is absent; its refresh was not attempted.
    #[default]
    Skipped,
    /// The subsystem is present but its refresh failed.
    Failed(String),
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Refreshed => f.write_str("refreshed"),
            StepOutcome::Skipped => f.write_str("skipped"),
            StepOutcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Per-step outcome of a completed reload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReloadReport {
    pub host_info: StepOutcome,
    pub services: StepOutcome,
    pub network: StepOutcome,
    pub os_agent: StepOutcome,
    pub sound: StepOutcome,
}

impl ReloadReport {
    /// Steps in execution order, labelled.
    pub fn steps(&self) -> [(&'static str, &StepOutcome); 5] {
        [
            ("host_info", &self.host_info),
            ("services", &self.services),
            ("network", &self.network),
            ("os_agent", &self.os_agent),
            ("sound", &self.sound),
        ]
    }

    pub fn has_failures(&self) -> bool {
        self.steps()
            .iter()
            .any(|(_, outcome)| matches!(outcome, StepOutcome::Failed(_)))
    }
}

/// Lifecycle of a [`HostManager`]. There is no way back to `NotLoaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loaded,
}

/// Owns the host collaborators and the capability cache.
pub struct HostManager {
    components: HostComponents,
    capabilities: CapabilityManager,
    bus: EventBus,
    state: Mutex<LoadState>,
    listeners: Mutex<Vec<Listener>>,
}

impl HostManager {
    pub fn new(components: HostComponents, bus: EventBus) -> Self {
        let capabilities =
            CapabilityManager::new(components.connections.clone(), components.os.clone());
        Self {
            components,
            capabilities,
            bus,
            state: Mutex::new(LoadState::NotLoaded),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Currently supported host features.
    pub fn features(&self) -> Arc<[HostFeature]> {
        self.capabilities.features()
    }

    pub fn capabilities(&self) -> &CapabilityManager {
        &self.capabilities
    }

    pub fn info(&self) -> &Arc<dyn Subsystem> {
        &self.components.info
    }

    pub fn services(&self) -> &Arc<dyn Subsystem> {
        &self.components.services
    }

    pub fn network(&self) -> &Arc<dyn Subsystem> {
        &self.components.network
    }

    pub fn sound(&self) -> &Arc<dyn Subsystem> {
        &self.components.sound
    }

    pub fn security(&self) -> &Arc<dyn SecurityProfile> {
        &self.components.security
    }

    pub fn state(&self) -> LoadState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refresh all subsystems from the live host.
    ///
    /// # Errors
    ///
    /// Only a host info failure is returned; the cache is then left as is.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<ReloadReport, HostError> {
        self.components.info.update().await?;

        let connections = &self.components.connections;
        let report = ReloadReport {
            host_info: StepOutcome::Refreshed,
            services: refresh_if(
                connections.systemd.is_connected(),
                self.components.services.as_ref(),
            )
            .await,
            network: refresh_if(
                connections.network.is_connected(),
                self.components.network.as_ref(),
            )
            .await,
            os_agent: refresh_if(connections.agent.is_connected(), connections.agent.as_ref())
                .await,
            sound: refresh(self.components.sound.as_ref()).await,
        };

        info!("Host information reload completed");
        self.capabilities.invalidate();
        Ok(report)
    }

    /// Startup sequence.  Runs once; later calls are ignored.
    #[instrument(skip(self))]
    pub async fn load(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == LoadState::Loaded {
                warn!("Host manager already loaded, not registering hardware events again");
                return;
            }
            *state = LoadState::Loaded;
        }

        if let Err(e) = self.reload().await {
            warn!(error = %e, "Host information reload on start failed");
        }

        let handler: Arc<dyn DeviceHandler> = Arc::new(HardwareEventHandler::new(
            self.components.policy.clone(),
            self.components.sound.clone(),
        ));
        {
            let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.push(
                self.bus
                    .register_event(BusEvent::HardwareNewDevice, handler.clone()),
            );
            listeners.push(self.bus.register_event(BusEvent::HardwareRemoveDevice, handler));
        }

        if let Err(e) = self.components.security.load().await {
            warn!(error = %e, "Loading host security profile on start failed");
        }
    }
}

async fn refresh_if<S>(connected: bool, subsystem: &S) -> StepOutcome
where
    S: Subsystem + ?Sized,
{
    if !connected {
        debug!(subsystem = subsystem.name(), "connection down, skipping refresh");
        return StepOutcome::Skipped;
    }
    refresh(subsystem).await
}

async fn refresh<S>(subsystem: &S) -> StepOutcome
where
    S: Subsystem + ?Sized,
{
    match subsystem.update().await {
        Ok(()) => StepOutcome::Refreshed,
        Err(e) => {
            warn!(subsystem = subsystem.name(), error = %e, "subsystem refresh failed");
            StepOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hostcore_hal::HardwareRegistry;
    use hostcore_hal::sim::{SimHost, SimProfile};
    use hostcore_types::Device;

    fn manager(host: &SimHost) -> (HostManager, EventBus) {
        let bus = EventBus::default();
        (HostManager::new(host.components(), bus.clone()), bus)
    }

    fn sound_card() -> Device {
        Device::new("controlC1", "/sys/class/sound/controlC1", "sound").with_numbers(116, 32)
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn reload_refreshes_every_connected_subsystem() {
        let host = SimHost::from_profile(&SimProfile {
            os_agent: true,
            ..SimProfile::default()
        });
        let (mgr, _bus) = manager(&host);

        let report = mgr.reload().await.unwrap();

        assert!(report.steps().iter().all(|(_, o)| **o == StepOutcome::Refreshed));
        assert_eq!(host.info.update_count(), 1);
        assert_eq!(host.services.update_count(), 1);
        assert_eq!(host.network.controller().update_count(), 1);
        assert_eq!(host.agent.update_count(), 1);
        assert_eq!(host.sound.update_count(), 1);
    }

    #[tokio::test]
    async fn absent_subsystems_are_never_refreshed() {
        let host = SimHost::from_profile(&SimProfile::offline());
        let (mgr, _bus) = manager(&host);

        let report = mgr.reload().await.unwrap();

        assert_eq!(report.services, StepOutcome::Skipped);
        assert_eq!(report.network, StepOutcome::Skipped);
        assert_eq!(report.os_agent, StepOutcome::Skipped);
        assert_eq!(host.services.update_count(), 0);
        assert_eq!(host.network.controller().update_count(), 0);
        assert_eq!(host.agent.update_count(), 0);
        // Host info and sound are attempted regardless of connections.
        assert_eq!(host.info.update_count(), 1);
        assert_eq!(host.sound.update_count(), 1);
    }

    #[tokio::test]
    async fn sound_failure_does_not_abort_reload() {
        let host = SimHost::default();
        let (mgr, _bus) = manager(&host);
        mgr.features();
        assert!(mgr.capabilities().is_valid());

        host.sound.fail_with("no sound server");
        let report = mgr.reload().await.unwrap();

        assert!(matches!(report.sound, StepOutcome::Failed(_)));
        assert_eq!(report.services, StepOutcome::Refreshed);
        assert_eq!(report.network, StepOutcome::Refreshed);
        assert!(!mgr.capabilities().is_valid(), "cache must still be invalidated");
    }

    #[tokio::test]
    async fn present_subsystem_failure_is_isolated() {
        let host = SimHost::default();
        let (mgr, _bus) = manager(&host);
        host.services.fail_with("systemd timeout");

        let report = mgr.reload().await.unwrap();

        assert!(matches!(report.services, StepOutcome::Failed(_)));
        assert_eq!(report.network, StepOutcome::Refreshed);
        assert_eq!(report.sound, StepOutcome::Refreshed);
        assert!(report.has_failures());
    }

    #[tokio::test]
    async fn host_info_failure_propagates_and_keeps_cache() {
        let host = SimHost::default();
        let (mgr, _bus) = manager(&host);
        let cached = mgr.features();
        host.info.fail_with("dbus unavailable");

        let result = mgr.reload().await;

        assert_eq!(result, Err(HostError::HostInfo("dbus unavailable".into())));
        assert_eq!(host.services.update_count(), 0);
        assert_eq!(host.sound.update_count(), 0);
        assert!(Arc::ptr_eq(&cached, &mgr.features()));
    }

    #[tokio::test]
    async fn reload_invalidates_even_when_set_is_unchanged() {
        let host = SimHost::default();
        let (mgr, _bus) = manager(&host);

        let before = mgr.features();
        let _ = mgr.features();
        assert_eq!(mgr.capabilities().evaluations(), 1);

        mgr.reload().await.unwrap();
        let after = mgr.features();

        assert_eq!(mgr.capabilities().evaluations(), 2);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn reload_picks_up_new_probe_state() {
        let host = SimHost::from_profile(&SimProfile {
            interfaces: vec![],
            ..SimProfile::default()
        });
        let (mgr, _bus) = manager(&host);
        assert!(!mgr.features().contains(&HostFeature::Networking));

        host.network.set_interfaces(vec!["eth0".into()]);
        mgr.reload().await.unwrap();
        assert!(mgr.features().contains(&HostFeature::Networking));
    }

    #[tokio::test]
    async fn load_tolerates_host_info_and_profile_failures() {
        let host = SimHost::from_profile(&SimProfile {
            security_profile: false,
            ..SimProfile::default()
        });
        host.info.fail_with("dbus unavailable");
        let (mgr, bus) = manager(&host);

        mgr.load().await;

        assert_eq!(mgr.state(), LoadState::Loaded);
        assert_eq!(host.security.load_count(), 1);
        assert_eq!(bus.listener_count(BusEvent::HardwareNewDevice), 1);
        assert_eq!(bus.listener_count(BusEvent::HardwareRemoveDevice), 1);
    }

    #[tokio::test]
    async fn second_load_does_not_register_again() {
        let host = SimHost::default();
        let (mgr, bus) = manager(&host);

        mgr.load().await;
        mgr.load().await;

        assert_eq!(host.info.update_count(), 1);
        assert_eq!(host.security.load_count(), 1);
        assert_eq!(bus.listener_count(BusEvent::HardwareNewDevice), 1);
    }

    #[tokio::test]
    async fn audio_hotplug_refreshes_sound_only() {
        let host = SimHost::default();
        let (mgr, bus) = manager(&host);
        mgr.load().await;
        mgr.features();
        let evaluations = mgr.capabilities().evaluations();

        let mut registry = HardwareRegistry::new(bus);
        registry.add_device(sound_card());
        wait_for(|| host.sound.update_count() == 2).await;

        registry.remove_device(&sound_card().sysfs).unwrap();
        wait_for(|| host.sound.update_count() == 3).await;

        assert_eq!(host.services.update_count(), 1);
        assert_eq!(host.network.controller().update_count(), 1);
        assert!(mgr.capabilities().is_valid(), "hot-plug must not touch the cache");
        mgr.features();
        assert_eq!(mgr.capabilities().evaluations(), evaluations);
    }

    #[tokio::test]
    async fn non_audio_hotplug_triggers_nothing() {
        let host = SimHost::default();
        let (mgr, bus) = manager(&host);
        mgr.load().await;

        let mut registry = HardwareRegistry::new(bus);
        registry.add_device(Device::new("sdb", "/sys/block/sdb", "block"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(host.sound.update_count(), 1, "only the startup reload");
    }

    #[tokio::test]
    async fn hotplug_during_reload_keeps_both_paths_consistent() {
        let host = SimHost::default();
        let (mgr, bus) = manager(&host);
        mgr.load().await;
        let mut registry = HardwareRegistry::new(bus);

        let (report, _) = tokio::join!(mgr.reload(), async {
            registry.add_device(sound_card());
        });

        assert!(report.is_ok());
        wait_for(|| host.sound.update_count() == 3).await;
        assert!(!mgr.capabilities().is_valid());
        assert!(mgr.features().contains(&HostFeature::Reboot));
    }
}
