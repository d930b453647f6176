//! [`CapabilityManager`] – derives and memoizes the host feature set.
//!
//! The feature set is a pure function of the current connection probes.  It
//! is computed on first read, cached, and handed out as a shared
//! `Arc<[HostFeature]>` until [`CapabilityManager::invalidate`] is called.
//! Nothing expires by time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use hostcore_hal::{BusConnections, OsDetector};
use hostcore_types::HostFeature;
use tracing::trace;

/// Evaluate the feature predicates against the current probe state.
///
/// The order is fixed and forms part of the contract:
///
/// 1. service manager connected → `Reboot`, `Shutdown`, `ServiceManagement`
/// 2. network manager connected **and** at least one interface → `Networking`
/// 3. hostname connected → `HostIdentity`
/// 4. timedate connected → `TimeAndDate`
/// 5. OS agent connected → `PrivilegedAgent`
/// 6. OS detector available → `SpecificOs`
pub fn resolve(connections: &BusConnections, os: &dyn OsDetector) -> Vec<HostFeature> {
    let mut features = Vec::new();

    // One connection backs all three; they come and go together.
    if connections.systemd.is_connected() {
        features.extend([
            HostFeature::Reboot,
            HostFeature::Shutdown,
            HostFeature::ServiceManagement,
        ]);
    }

    if connections.network.is_connected() && connections.network.has_interfaces() {
        features.push(HostFeature::Networking);
    }

    if connections.hostname.is_connected() {
        features.push(HostFeature::HostIdentity);
    }

    if connections.timedate.is_connected() {
        features.push(HostFeature::TimeAndDate);
    }

    if connections.agent.is_connected() {
        features.push(HostFeature::PrivilegedAgent);
    }

    if os.available() {
        features.push(HostFeature::SpecificOs);
    }

    features
}

struct Slot {
    generation: u64,
    value: Option<Arc<[HostFeature]>>,
}

/// Memoized view of the host feature set.
///
/// # Example
///
/// ```
/// use hostcore_hal::sim::{SimHost, SimProfile};
/// use hostcore_kernel::capability_manager::CapabilityManager;
///
/// let host = SimHost::from_profile(&SimProfile::offline());
/// let components = host.components();
/// let mgr = CapabilityManager::new(components.connections, components.os);
///
/// assert!(mgr.features().is_empty());
/// assert!(mgr.is_valid());
/// ```
pub struct CapabilityManager {
    connections: BusConnections,
    os: Arc<dyn OsDetector>,
    slot: RwLock<Slot>,
    evaluations: AtomicU64,
}

impl CapabilityManager {
    /// Create a manager with an empty (invalid) cache.
    pub fn new(connections: BusConnections, os: Arc<dyn OsDetector>) -> Self {
        Self {
            connections,
            os,
            slot: RwLock::new(Slot {
                generation: 0,
                value: None,
            }),
            evaluations: AtomicU64::new(0),
        }
    }

    /// The current feature set.
    ///
    /// Returns the cached set when valid, otherwise re-evaluates the
    /// predicates and caches the result.  Repeated calls without an
    /// intervening [`invalidate`][Self::invalidate] return the same `Arc`.
    pub fn features(&self) -> Arc<[HostFeature]> {
        let generation = {
            let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = &slot.value {
                return value.clone();
            }
            slot.generation
        };

        self.evaluations.fetch_add(1, Ordering::SeqCst);
        let computed: Arc<[HostFeature]> = resolve(&self.connections, self.os.as_ref()).into();
        trace!(features = ?computed, "host features evaluated");

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        // An invalidation raced with the evaluation: hand out the fresh
        // result but do not let it re-validate the cache.
        if slot.generation != generation {
            return computed;
        }
        match &slot.value {
            Some(existing) => existing.clone(),
            None => {
                slot.value = Some(computed.clone());
                computed
            }
        }
    }

    /// Drop the cached set; the next read re-evaluates.
    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.generation = slot.generation.wrapping_add(1);
        slot.value = None;
    }

    /// Whether a cached set is currently held.
    pub fn is_valid(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .value
            .is_some()
    }

    /// How many times the predicates have been evaluated.
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostcore_hal::sim::{SimHost, SimProfile};

    fn manager(host: &SimHost) -> CapabilityManager {
        let components = host.components();
        CapabilityManager::new(components.connections, components.os)
    }

    fn profile_from_bits(bits: u32) -> SimProfile {
        SimProfile {
            systemd: bits & 1 != 0,
            network: bits & 2 != 0,
            interfaces: if bits & 4 != 0 { vec!["eth0".into()] } else { vec![] },
            hostname: bits & 8 != 0,
            timedate: bits & 16 != 0,
            os_agent: bits & 32 != 0,
            specific_os: bits & 64 != 0,
            ..SimProfile::default()
        }
    }

    #[test]
    fn all_connected_yields_full_set_in_order() {
        let host = SimHost::from_profile(&SimProfile {
            os_agent: true,
            specific_os: true,
            ..SimProfile::default()
        });
        let mgr = manager(&host);
        assert_eq!(
            &*mgr.features(),
            &[
                HostFeature::Reboot,
                HostFeature::Shutdown,
                HostFeature::ServiceManagement,
                HostFeature::Networking,
                HostFeature::HostIdentity,
                HostFeature::TimeAndDate,
                HostFeature::PrivilegedAgent,
                HostFeature::SpecificOs,
            ]
        );
    }

    #[test]
    fn networking_and_hostname_only() {
        let host = SimHost::from_profile(&SimProfile {
            systemd: false,
            network: true,
            interfaces: vec!["eth0".into()],
            hostname: true,
            timedate: false,
            os_agent: false,
            specific_os: false,
            ..SimProfile::default()
        });
        let mgr = manager(&host);
        assert_eq!(
            &*mgr.features(),
            &[HostFeature::Networking, HostFeature::HostIdentity]
        );
    }

    #[test]
    fn everything_offline_yields_empty_set() {
        let host = SimHost::from_profile(&SimProfile::offline());
        assert!(manager(&host).features().is_empty());
    }

    #[test]
    fn second_read_is_served_from_cache() {
        let host = SimHost::default();
        let mgr = manager(&host);

        let first = mgr.features();
        let probes = host.probe_count();
        let second = mgr.features();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(host.probe_count(), probes, "cached read must not probe");
        assert_eq!(mgr.evaluations(), 1);
    }

    #[test]
    fn invalidate_forces_re_evaluation() {
        let host = SimHost::default();
        let mgr = manager(&host);

        let before = mgr.features();
        mgr.invalidate();
        assert!(!mgr.is_valid());

        let after = mgr.features();
        assert_eq!(before, after);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(mgr.evaluations(), 2);
    }

    #[test]
    fn stale_cache_survives_probe_changes_until_invalidated() {
        let host = SimHost::default();
        let mgr = manager(&host);
        assert!(mgr.features().contains(&HostFeature::Reboot));

        host.systemd.set_connected(false);
        assert!(mgr.features().contains(&HostFeature::Reboot));

        mgr.invalidate();
        assert!(!mgr.features().contains(&HostFeature::Reboot));
    }

    #[test]
    fn service_manager_features_are_all_or_nothing() {
        let block = [
            HostFeature::Reboot,
            HostFeature::Shutdown,
            HostFeature::ServiceManagement,
        ];
        for bits in 0..128 {
            let host = SimHost::from_profile(&profile_from_bits(bits));
            let features = manager(&host).features();
            let present = block.iter().filter(|f| features.contains(f)).count();
            assert!(present == 0 || present == 3, "bits={bits:#b} -> {features:?}");
            if present == 3 {
                assert_eq!(&features[..3], &block, "block must be contiguous and first");
            }
        }
    }

    #[test]
    fn networking_requires_connection_and_interfaces() {
        let cases = [
            (false, vec![], false),
            (true, vec![], false),
            (true, vec!["eth0".to_string()], true),
            (false, vec!["eth0".to_string()], false),
        ];
        for (connected, interfaces, expected) in cases {
            let host = SimHost::from_profile(&SimProfile {
                network: connected,
                interfaces: interfaces.clone(),
                ..SimProfile::default()
            });
            let has = manager(&host).features().contains(&HostFeature::Networking);
            assert_eq!(has, expected, "connected={connected} interfaces={interfaces:?}");
        }
    }

    #[test]
    fn resolve_is_pure_over_probe_state() {
        let host = SimHost::from_profile(&SimProfile::offline());
        let components = host.components();
        assert!(resolve(&components.connections, components.os.as_ref()).is_empty());

        host.os.set_available(true);
        assert_eq!(
            resolve(&components.connections, components.os.as_ref()),
            vec![HostFeature::SpecificOs]
        );
    }
}
