//! [`PolicyMatcher`] – classifies hardware devices into policy groups.
//!
//! The default [`CgroupPolicy`] mirrors the device cgroup rules a container
//! would be granted for each group: a device belongs to a group when its
//! character-device major number is one the group's rules allow, or when its
//! udev subsystem is one the group owns outright.

use hostcore_types::{Device, PolicyGroup};

/// Pure classification of a device against a policy group.
pub trait PolicyMatcher: Send + Sync {
    fn is_match(&self, group: PolicyGroup, device: &Device) -> bool;
}

/// Major-number based policy matching.
///
/// | Group | Majors | Subsystems |
/// |---|---|---|
/// | Audio | 116 (ALSA), 14 (OSS) | `sound` |
/// | Video | 81, 29 | `video4linux` |
/// | Usb | 189 | `usb` |
/// | Uart | 4, 166, 188, 204 | – |
/// | Gpio | 254 | `gpio` |
/// | Bluetooth | – | `bluetooth` |
#[derive(Debug, Default, Clone, Copy)]
pub struct CgroupPolicy;

impl CgroupPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Character-device majors allowed for `group`.
    pub fn majors(group: PolicyGroup) -> &'static [u32] {
        match group {
            PolicyGroup::Audio => &[116, 14],
            PolicyGroup::Video => &[81, 29],
            PolicyGroup::Usb => &[189],
            PolicyGroup::Uart => &[4, 166, 188, 204],
            PolicyGroup::Gpio => &[254],
            PolicyGroup::Bluetooth => &[],
        }
    }

    fn subsystems(group: PolicyGroup) -> &'static [&'static str] {
        match group {
            PolicyGroup::Audio => &["sound"],
            PolicyGroup::Video => &["video4linux"],
            PolicyGroup::Usb => &["usb"],
            PolicyGroup::Uart => &[],
            PolicyGroup::Gpio => &["gpio"],
            PolicyGroup::Bluetooth => &["bluetooth"],
        }
    }
}

impl PolicyMatcher for CgroupPolicy {
    fn is_match(&self, group: PolicyGroup, device: &Device) -> bool {
        let by_major = device
            .major
            .is_some_and(|major| Self::majors(group).contains(&major));
        by_major || Self::subsystems(group).contains(&device.subsystem.as_str())
    }
}
