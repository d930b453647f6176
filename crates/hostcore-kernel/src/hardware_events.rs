//! [`HardwareEventHandler`] – scoped refresh on hot-plug.
//!
//! Bound to both the device-added and device-removed topics.  A device that
//! the policy classifies as [`PolicyGroup::Audio`] triggers a refresh of the
//! sound subsystem only.  The handler holds no reference to the capability
//! cache, so a hot-plug event can never re-validate or invalidate it.

use std::sync::Arc;

use async_trait::async_trait;
use hostcore_hal::{PolicyMatcher, Subsystem};
use hostcore_middleware::DeviceHandler;
use hostcore_types::{Device, HostError, PolicyGroup};
use tracing::debug;

pub struct HardwareEventHandler {
    policy: Arc<dyn PolicyMatcher>,
    sound: Arc<dyn Subsystem>,
}

impl HardwareEventHandler {
    pub fn new(policy: Arc<dyn PolicyMatcher>, sound: Arc<dyn Subsystem>) -> Self {
        Self { policy, sound }
    }
}

#[async_trait]
impl DeviceHandler for HardwareEventHandler {
    async fn handle(&self, device: Device) -> Result<(), HostError> {
        if self.policy.is_match(PolicyGroup::Audio, &device) {
            debug!(device = %device.sysfs.display(), "audio device changed, refreshing sound");
            return self.sound.update().await;
        }
        debug!(device = %device.sysfs.display(), "device not routed to any subsystem");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostcore_hal::CgroupPolicy;
    use hostcore_hal::sim::SimController;

    fn handler(sound: &Arc<SimController>) -> HardwareEventHandler {
        HardwareEventHandler::new(Arc::new(CgroupPolicy), sound.clone())
    }

    #[tokio::test]
    async fn audio_device_refreshes_sound() {
        let sound = Arc::new(SimController::new("sound", HostError::Sound));
        let device = Device::new("pcmC0D0p", "/sys/class/sound/pcmC0D0p", "sound").with_numbers(116, 16);

        handler(&sound).handle(device).await.unwrap();
        assert_eq!(sound.update_count(), 1);
    }

    #[tokio::test]
    async fn other_device_is_ignored() {
        let sound = Arc::new(SimController::new("sound", HostError::Sound));
        let device = Device::new("ttyACM0", "/sys/class/tty/ttyACM0", "tty").with_numbers(166, 0);

        handler(&sound).handle(device).await.unwrap();
        assert_eq!(sound.update_count(), 0);
    }

    #[tokio::test]
    async fn sound_failure_is_reported_to_the_listener() {
        let sound = Arc::new(SimController::new("sound", HostError::Sound));
        sound.fail_with("pulseaudio gone");
        let device = Device::new("card0", "/sys/class/sound/card0", "sound");

        let result = handler(&sound).handle(device).await;
        assert_eq!(result, Err(HostError::Sound("pulseaudio gone".into())));
    }
}
