//! `hostcore-kernel` – Host Capability Orchestration
//!
//! Decides which host features are currently available and keeps cached
//! subsystem state in step with the live host.  It does not control any
//! subsystem itself; it only probes, refreshes and routes.
//!
//! # Modules
//!
//! - [`capability_manager`] – [`CapabilityManager`][capability_manager::CapabilityManager]:
//!   derives the ordered [`HostFeature`][hostcore_types::HostFeature] set from
//!   the current connection probes and memoizes it until explicitly
//!   invalidated.
//! - [`host_manager`] – [`HostManager`][host_manager::HostManager]:
//!   the reload protocol (per-subsystem refresh with failure isolation) and
//!   the one-shot startup sequence.
//! - [`hardware_events`] – [`HardwareEventHandler`][hardware_events::HardwareEventHandler]:
//!   reacts to hot-plug events by refreshing only the subsystem whose policy
//!   group matches the device.

pub mod capability_manager;
pub mod hardware_events;
pub mod host_manager;

pub use capability_manager::CapabilityManager;
pub use hardware_events::HardwareEventHandler;
pub use host_manager::{HostManager, LoadState, ReloadReport, StepOutcome};
