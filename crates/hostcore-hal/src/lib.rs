//! `hostcore-hal` – Host Abstraction Layer
//!
//! The narrow interfaces through which the orchestration core talks to the
//! host, plus the hardware device registry that feeds the event bus.
//!
//! # Modules
//!
//! - [`controller`] – collaborator traits: [`ConnectionProbe`],
//!   [`NetworkProbe`], [`OsDetector`], [`Subsystem`], [`SecurityProfile`],
//!   and the [`HostComponents`] bundle handed to the host manager.
//! - [`policy`] – [`PolicyMatcher`] and the cgroup based [`CgroupPolicy`]
//!   that classifies a [`Device`][hostcore_types::Device] into a
//!   [`PolicyGroup`][hostcore_types::PolicyGroup].
//! - [`registry`] – [`HardwareRegistry`]: tracks attached devices and fires
//!   hot-plug events on the [`EventBus`][hostcore_middleware::EventBus].
//! - [`sim`] – in-process simulated controllers for tests and the demo CLI.

pub mod controller;
pub mod policy;
pub mod registry;
pub mod sim;

pub use controller::{
    AgentConnection, BusConnections, ConnectionProbe, HostComponents, NetworkProbe, OsDetector,
    SecurityProfile, Subsystem,
};
pub use policy::{CgroupPolicy, PolicyMatcher};
pub use registry::HardwareRegistry;
pub use sim::{SimHost, SimProfile};
