//! Collaborator interfaces consumed by the orchestration core.
//!
//! Every host subsystem (service manager, network manager, host info reader,
//! sound server, OS agent, security-profile loader) lives behind one of these
//! traits.  The core only ever reads connection probes and triggers refreshes;
//! it never establishes the underlying connections itself.

use std::sync::Arc;

use async_trait::async_trait;
use hostcore_types::HostError;

use crate::policy::PolicyMatcher;

/// Liveness of a subsystem's bus connection.
///
/// Implementations must answer from cached state: a probe is a single scalar
/// read, never a bus round-trip.
pub trait ConnectionProbe: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Network manager probe: connection liveness plus the currently known
/// interfaces.
pub trait NetworkProbe: ConnectionProbe {
    /// Names of the interfaces the network manager currently reports.
    fn interfaces(&self) -> Vec<String>;

    fn has_interfaces(&self) -> bool {
        !self.interfaces().is_empty()
    }
}

/// Detects whether the host runs the supported operating system.
pub trait OsDetector: Send + Sync {
    fn available(&self) -> bool;
}

/// A subsystem whose cached state can be refreshed from the live host.
#[async_trait]
pub trait Subsystem: Send + Sync {
    /// Short name used in logs, e.g. `"sound"`.
    fn name(&self) -> &str;

    /// Re-read the subsystem's state from the host.
    ///
    /// # Errors
    ///
    /// Returns the subsystem-specific [`HostError`] variant on failure.
    async fn update(&self) -> Result<(), HostError>;
}

/// The privileged OS agent is both probed and refreshed through the same
/// connection.
pub trait AgentConnection: ConnectionProbe + Subsystem {}

impl<T: ConnectionProbe + Subsystem> AgentConnection for T {}

/// Mandatory-access-control profile loader.
#[async_trait]
pub trait SecurityProfile: Send + Sync {
    /// Load (or reload) the profile into the kernel.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::SecurityProfile`] when the profile is missing or
    /// malformed.
    async fn load(&self) -> Result<(), HostError>;
}

/// The bus connections whose liveness decides which features exist.
#[derive(Clone)]
pub struct BusConnections {
    pub systemd: Arc<dyn ConnectionProbe>,
    pub network: Arc<dyn NetworkProbe>,
    pub hostname: Arc<dyn ConnectionProbe>,
    pub timedate: Arc<dyn ConnectionProbe>,
    pub agent: Arc<dyn AgentConnection>,
}

/// Everything the host manager needs from the outside world.
#[derive(Clone)]
pub struct HostComponents {
    pub connections: BusConnections,
    pub os: Arc<dyn OsDetector>,
    /// Host info reader; always refreshed first on reload.
    pub info: Arc<dyn Subsystem>,
    pub services: Arc<dyn Subsystem>,
    pub network: Arc<dyn Subsystem>,
    pub sound: Arc<dyn Subsystem>,
    pub security: Arc<dyn SecurityProfile>,
    pub policy: Arc<dyn PolicyMatcher>,
}
