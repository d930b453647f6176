use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A named host capability that may be exposed to consumers of the host
/// management layer.
///
/// The set is closed: new flags are only ever added at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostFeature {
    /// Reboot the host via the service manager.
    Reboot,
    /// Power off the host via the service manager.
    Shutdown,
    /// List / start / stop host services.
    #[serde(rename = "services")]
    ServiceManagement,
    /// Inspect and configure network interfaces.
    #[serde(rename = "network")]
    Networking,
    /// Read and set the host name.
    #[serde(rename = "hostname")]
    HostIdentity,
    /// Read and set time, date and timezone.
    #[serde(rename = "timedate")]
    TimeAndDate,
    /// The privileged OS agent is reachable.
    #[serde(rename = "os_agent")]
    PrivilegedAgent,
    /// The host runs the supported operating system.
    #[serde(rename = "specific_os")]
    SpecificOs,
}

impl HostFeature {
    /// Stable wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HostFeature::Reboot => "reboot",
            HostFeature::Shutdown => "shutdown",
            HostFeature::ServiceManagement => "services",
            HostFeature::Networking => "network",
            HostFeature::HostIdentity => "hostname",
            HostFeature::TimeAndDate => "timedate",
            HostFeature::PrivilegedAgent => "os_agent",
            HostFeature::SpecificOs => "specific_os",
        }
    }
}

impl fmt::Display for HostFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification bucket used to route hot-plug events to the subsystem they
/// affect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyGroup {
    Audio,
    Video,
    Usb,
    Uart,
    Gpio,
    Bluetooth,
}

/// A hardware device as reported by the hardware registry.
///
/// The core never mutates a device record; it only classifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Kernel name, e.g. `"controlC0"`.
    pub name: String,
    /// Unique sysfs path; used as the registry key.
    pub sysfs: PathBuf,
    /// udev subsystem, e.g. `"sound"`, `"tty"`, `"usb"`.
    pub subsystem: String,
    /// Device node under `/dev`, when the device has one.
    #[serde(default)]
    pub dev_path: Option<PathBuf>,
    /// Character-device major number.
    #[serde(default)]
    pub major: Option<u32>,
    #[serde(default)]
    pub minor: Option<u32>,
    /// Remaining udev properties.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Device {
    /// Create a device with the mandatory fields; everything else is empty.
    pub fn new(name: impl Into<String>, sysfs: impl Into<PathBuf>, subsystem: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sysfs: sysfs.into(),
            subsystem: subsystem.into(),
            dev_path: None,
            major: None,
            minor: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style setter for the major/minor pair.
    pub fn with_numbers(mut self, major: u32, minor: u32) -> Self {
        self.major = Some(major);
        self.minor = Some(minor);
        self
    }

    pub fn with_dev_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dev_path = Some(path.into());
        self
    }
}

/// Unified event wrapper for the hardware event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "hostcore-hal::registry"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped with the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the hardware event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A device was attached to the host.
    HardwareNewDevice(Device),
    /// A device was detached from the host.
    HardwareRemoveDevice(Device),
}

impl EventPayload {
    /// The device the event is about.
    pub fn device(&self) -> &Device {
        match self {
            EventPayload::HardwareNewDevice(d) | EventPayload::HardwareRemoveDevice(d) => d,
        }
    }

    pub fn into_device(self) -> Device {
        match self {
            EventPayload::HardwareNewDevice(d) | EventPayload::HardwareRemoveDevice(d) => d,
        }
    }
}

/// Global error type spanning every host subsystem the core talks to.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostError {
    #[error("Host info update failed: {0}")]
    HostInfo(String),

    #[error("Service manager error: {0}")]
    Services(String),

    #[error("Network manager error: {0}")]
    Network(String),

    #[error("OS agent error: {0}")]
    Agent(String),

    #[error("Sound server error: {0}")]
    Sound(String),

    #[error("Security profile error: {0}")]
    SecurityProfile(String),

    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("Event bus error: {0}")]
    Bus(String),
}
