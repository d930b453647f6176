//! `hostcore-runtime` – Process Plumbing
//!
//! # Modules
//!
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.
//! - [`boot`] – [`HostRuntime`][boot::HostRuntime]: assembles the event bus,
//!   hardware registry, simulated host and
//!   [`HostManager`][hostcore_kernel::HostManager], then runs the startup
//!   sequence.

pub mod boot;
pub mod telemetry;

pub use boot::HostRuntime;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};

// Re-exported so the CLI only needs this crate to drive the manager.
pub use hostcore_kernel::{HostManager, LoadState, ReloadReport, StepOutcome};
