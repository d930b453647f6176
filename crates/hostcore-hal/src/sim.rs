//! [`SimHost`] – in-process simulated host for tests and the demo CLI.
//!
//! Every collaborator the host manager consumes is backed by a stub that
//! keeps its state in atomics, counts how often it is probed or refreshed,
//! and can be told to fail.  This lets the full orchestration stack run in a
//! unit test or CI job without a system bus.
//!
//! # Stub behaviour
//!
//! | Stub | Behaviour |
//! |---|---|
//! | [`SimController`] | `is_connected()` returns the configured flag; `update()` yields once, then fails with the configured message or succeeds. |
//! | [`SimNetwork`] | A [`SimController`] plus a mutable interface list. |
//! | [`SimOs`] | `available()` returns the configured flag. |
//! | [`SimSecurityProfile`] | `load()` fails with the configured message or succeeds. |

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use hostcore_types::HostError;
use serde::{Deserialize, Serialize};

use crate::controller::{
    BusConnections, ConnectionProbe, HostComponents, NetworkProbe, OsDetector, SecurityProfile,
    Subsystem,
};
use crate::policy::CgroupPolicy;

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// Declarative description of a simulated host, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimProfile {
    /// Service manager bus connection is up.
    pub systemd: bool,
    /// Network manager bus connection is up.
    pub network: bool,
    /// Interfaces reported by the network manager.
    pub interfaces: Vec<String>,
    pub hostname: bool,
    pub timedate: bool,
    pub os_agent: bool,
    /// Host runs the supported OS.
    pub specific_os: bool,
    /// Sound server answers refreshes; when `false` every sound refresh fails.
    pub sound: bool,
    /// Security profile loads cleanly; when `false` loading fails.
    pub security_profile: bool,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            systemd: true,
            network: true,
            interfaces: vec!["eth0".to_string()],
            hostname: true,
            timedate: true,
            os_agent: false,
            specific_os: false,
            sound: true,
            security_profile: true,
        }
    }
}

impl SimProfile {
    /// Every connection down, no interfaces, nothing available.
    pub fn offline() -> Self {
        Self {
            systemd: false,
            network: false,
            interfaces: Vec::new(),
            hostname: false,
            timedate: false,
            os_agent: false,
            specific_os: false,
            sound: false,
            security_profile: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stub controller
// ─────────────────────────────────────────────────────────────────────────────

/// Generic stub for a probed and/or refreshable subsystem.
pub struct SimController {
    name: String,
    connected: AtomicBool,
    failure: Mutex<Option<String>>,
    probes: AtomicUsize,
    updates: AtomicUsize,
    error: fn(String) -> HostError,
}

impl SimController {
    /// Create a connected, healthy controller whose failures are reported
    /// through `error` (e.g. `HostError::Sound`).
    pub fn new(name: impl Into<String>, error: fn(String) -> HostError) -> Self {
        Self {
            name: name.into(),
            connected: AtomicBool::new(true),
            failure: Mutex::new(None),
            probes: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            error,
        }
    }

    pub fn with_connected(self, connected: bool) -> Self {
        self.set_connected(connected);
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make every subsequent `update()` fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Number of `is_connected()` calls so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Number of `update()` calls so far, successful or not.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl ConnectionProbe for SimController {
    fn is_connected(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Subsystem for SimController {
    fn name(&self) -> &str {
        &self.name
    }

    async fn update(&self) -> Result<(), HostError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        // A real controller suspends on the bus call.
        tokio::task::yield_now().await;
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match failure {
            Some(message) => Err((self.error)(message)),
            None => Ok(()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stub network manager
// ─────────────────────────────────────────────────────────────────────────────

pub struct SimNetwork {
    controller: SimController,
    interfaces: Mutex<Vec<String>>,
}

impl SimNetwork {
    pub fn new(connected: bool, interfaces: Vec<String>) -> Self {
        Self {
            controller: SimController::new("network", HostError::Network).with_connected(connected),
            interfaces: Mutex::new(interfaces),
        }
    }

    pub fn controller(&self) -> &SimController {
        &self.controller
    }

    pub fn set_interfaces(&self, interfaces: Vec<String>) {
        *self.interfaces.lock().unwrap_or_else(PoisonError::into_inner) = interfaces;
    }
}

impl ConnectionProbe for SimNetwork {
    fn is_connected(&self) -> bool {
        self.controller.is_connected()
    }
}

impl NetworkProbe for SimNetwork {
    fn interfaces(&self) -> Vec<String> {
        self.interfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Subsystem for SimNetwork {
    fn name(&self) -> &str {
        self.controller.name()
    }

    async fn update(&self) -> Result<(), HostError> {
        self.controller.update().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stub OS detector and security profile
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct SimOs {
    available: AtomicBool,
    probes: AtomicUsize,
}

impl SimOs {
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl OsDetector for SimOs {
    fn available(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.available.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct SimSecurityProfile {
    failure: Mutex<Option<String>>,
    loads: AtomicUsize,
}

impl SimSecurityProfile {
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecurityProfile for SimSecurityProfile {
    async fn load(&self) -> Result<(), HostError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match failure {
            Some(message) => Err(HostError::SecurityProfile(message)),
            None => Ok(()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SimHost
// ─────────────────────────────────────────────────────────────────────────────

/// A complete simulated host.  Fields stay public so tests can flip state and
/// inspect counters after handing [`SimHost::components`] to a manager.
pub struct SimHost {
    pub systemd: Arc<SimController>,
    pub network: Arc<SimNetwork>,
    pub hostname: Arc<SimController>,
    pub timedate: Arc<SimController>,
    pub agent: Arc<SimController>,
    pub os: Arc<SimOs>,
    pub info: Arc<SimController>,
    pub services: Arc<SimController>,
    pub sound: Arc<SimController>,
    pub security: Arc<SimSecurityProfile>,
}

impl SimHost {
    /// Build a host matching `profile`.
    pub fn from_profile(profile: &SimProfile) -> Self {
        let sound = SimController::new("sound", HostError::Sound);
        if !profile.sound {
            sound.fail_with("sound server is not running");
        }
        let security = SimSecurityProfile::default();
        if !profile.security_profile {
            security.fail_with("profile not found");
        }
        Self {
            systemd: Arc::new(
                SimController::new("systemd", HostError::Services).with_connected(profile.systemd),
            ),
            network: Arc::new(SimNetwork::new(profile.network, profile.interfaces.clone())),
            hostname: Arc::new(
                SimController::new("hostname", HostError::HostInfo).with_connected(profile.hostname),
            ),
            timedate: Arc::new(
                SimController::new("timedate", HostError::HostInfo).with_connected(profile.timedate),
            ),
            agent: Arc::new(
                SimController::new("os_agent", HostError::Agent).with_connected(profile.os_agent),
            ),
            os: Arc::new(SimOs::new(profile.specific_os)),
            info: Arc::new(SimController::new("info", HostError::HostInfo)),
            services: Arc::new(SimController::new("services", HostError::Services)),
            sound: Arc::new(sound),
            security: Arc::new(security),
        }
    }

    /// Collaborator bundle backed by this host, classified with
    /// [`CgroupPolicy`].
    pub fn components(&self) -> HostComponents {
        HostComponents {
            connections: BusConnections {
                systemd: self.systemd.clone(),
                network: self.network.clone(),
                hostname: self.hostname.clone(),
                timedate: self.timedate.clone(),
                agent: self.agent.clone(),
            },
            os: self.os.clone(),
            info: self.info.clone(),
            services: self.services.clone(),
            network: self.network.clone(),
            sound: self.sound.clone(),
            security: self.security.clone(),
            policy: Arc::new(CgroupPolicy),
        }
    }

    /// Total connection probes across every bus connection and the OS
    /// detector.
    pub fn probe_count(&self) -> usize {
        self.systemd.probe_count()
            + self.network.controller().probe_count()
            + self.hostname.probe_count()
            + self.timedate.probe_count()
            + self.agent.probe_count()
            + self.os.probe_count()
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::from_profile(&SimProfile::default())
    }
}
