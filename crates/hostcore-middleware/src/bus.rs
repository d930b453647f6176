//! Typed, topic-based publish/subscribe bus for hardware events.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! listener receives every event without any single listener blocking the
//! others.
//!
//! # Topics
//!
//! | Topic | Fired when |
//! |---|---|
//! | [`BusEvent::HardwareNewDevice`] | a device is attached to the host |
//! | [`BusEvent::HardwareRemoveDevice`] | a device is detached from the host |
//!
//! # Listeners
//!
//! [`EventBus::register_event`] binds an async [`DeviceHandler`] to a topic
//! by spawning a Tokio task that drains the topic channel and hands each
//! device to the handler.  The returned [`Listener`] owns that task; dropping
//! it stops the task.  Registration is not deduplicated: registering the same
//! handler twice yields two independent listeners.

use std::sync::Arc;

use async_trait::async_trait;
use hostcore_types::{Device, Event, EventPayload, HostError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow listeners).
pub const DEFAULT_CAPACITY: usize = 64;

/// Enumeration of all routing topics on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusEvent {
    /// A device was attached.
    HardwareNewDevice,
    /// A device was detached.
    HardwareRemoveDevice,
}

impl BusEvent {
    /// The topic an event payload is routed to.
    pub fn of(payload: &EventPayload) -> Self {
        match payload {
            EventPayload::HardwareNewDevice(_) => BusEvent::HardwareNewDevice,
            EventPayload::HardwareRemoveDevice(_) => BusEvent::HardwareRemoveDevice,
        }
    }
}

/// Receives devices from a topic the handler was registered for.
///
/// Errors returned by a handler are logged by the listener task and never
/// stop it.
#[async_trait]
pub trait DeviceHandler: Send + Sync {
    async fn handle(&self, device: Device) -> Result<(), HostError>;
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    new_device: broadcast::Sender<Event>,
    remove_device: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently and
    /// must be non-zero.
    pub fn new(capacity: usize) -> Self {
        let (new_device, _) = broadcast::channel(capacity);
        let (remove_device, _) = broadcast::channel(capacity);
        Self {
            new_device,
            remove_device,
        }
    }

    /// Publish `event` to the topic matching its payload.
    ///
    /// Returns the number of receivers that were handed the event.  Firing
    /// with nobody listening is a normal condition (e.g. devices discovered
    /// before the host manager loaded) and returns `0`.
    pub fn fire_event(&self, event: Event) -> usize {
        let topic = BusEvent::of(&event.payload);
        match self.topic_sender(topic).send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(_)) => {
                debug!(?topic, "no listeners for bus event");
                0
            }
        }
    }

    /// Subscribe to a specific topic.
    pub fn subscribe_to(&self, event: BusEvent) -> EventReceiver {
        EventReceiver {
            event,
            receiver: self.topic_sender(event).subscribe(),
        }
    }

    /// Bind `handler` to `event`.
    ///
    /// The subscription is taken before this function returns, so events
    /// fired afterwards are guaranteed to reach the handler.  Must be called
    /// from within a Tokio runtime.
    pub fn register_event(&self, event: BusEvent, handler: Arc<dyn DeviceHandler>) -> Listener {
        let mut receiver = self.subscribe_to(event);
        let task = tokio::spawn(async move {
            loop {
                match receiver.receiver.recv().await {
                    Ok(ev) => {
                        let device = ev.payload.into_device();
                        let sysfs = device.sysfs.display().to_string();
                        if let Err(e) = handler.handle(device).await {
                            warn!(?event, device = %sysfs, error = %e, "device handler failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(?event, lagged_by = n, "bus listener lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Listener { event, task }
    }

    /// Number of live receivers (listeners and raw subscriptions) on `event`.
    pub fn listener_count(&self, event: BusEvent) -> usize {
        self.topic_sender(event).receiver_count()
    }

    fn topic_sender(&self, event: BusEvent) -> &broadcast::Sender<Event> {
        match event {
            BusEvent::HardwareNewDevice => &self.new_device,
            BusEvent::HardwareRemoveDevice => &self.remove_device,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Receivers
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`BusEvent`] topic.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct EventReceiver {
    event: BusEvent,
    receiver: broadcast::Receiver<Event>,
}

impl EventReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns `Err(RecvError::Lagged(n))` when the receiver fell behind and
    /// `n` events were dropped, `Err(RecvError::Closed)` once the bus is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    pub fn event(&self) -> BusEvent {
        self.event
    }
}

/// Handle to a task spawned by [`EventBus::register_event`].
///
/// Dropping the handle aborts the task.
#[derive(Debug)]
pub struct Listener {
    event: BusEvent,
    task: JoinHandle<()>,
}

impl Listener {
    /// Topic this listener is bound to.
    pub fn event(&self) -> BusEvent {
        self.event
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn sound_card() -> Device {
        Device::new("controlC0", "/sys/devices/pci0000:00/sound/card0/controlC0", "sound")
            .with_numbers(116, 0)
    }

    fn added(device: Device) -> Event {
        Event::new("hostcore-middleware::test", EventPayload::HardwareNewDevice(device))
    }

    fn removed(device: Device) -> Event {
        Event::new("hostcore-middleware::test", EventPayload::HardwareRemoveDevice(device))
    }

    struct Forward(mpsc::UnboundedSender<Device>);

    #[async_trait]
    impl DeviceHandler for Forward {
        async fn handle(&self, device: Device) -> Result<(), HostError> {
            self.0
                .send(device)
                .map_err(|e| HostError::Bus(e.to_string()))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl DeviceHandler for AlwaysFails {
        async fn handle(&self, _device: Device) -> Result<(), HostError> {
            Err(HostError::Sound("daemon missing".into()))
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(BusEvent::HardwareNewDevice);

        let event = added(sound_card());
        assert_eq!(bus.fire_event(event.clone()), 1);

        let received = rx.recv().await?;
        assert_eq!(received.id, event.id);
        assert_eq!(rx.event(), BusEvent::HardwareNewDevice);
        Ok(())
    }

    #[test]
    fn fire_without_listeners_returns_zero() {
        let bus = EventBus::default();
        assert_eq!(bus.fire_event(added(sound_card())), 0);
    }

    #[test]
    fn topic_follows_payload() {
        assert_eq!(
            BusEvent::of(&EventPayload::HardwareNewDevice(sound_card())),
            BusEvent::HardwareNewDevice
        );
        assert_eq!(
            BusEvent::of(&EventPayload::HardwareRemoveDevice(sound_card())),
            BusEvent::HardwareRemoveDevice
        );
    }

    #[tokio::test]
    async fn registered_handler_receives_device() {
        let bus = EventBus::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _listener = bus.register_event(BusEvent::HardwareNewDevice, Arc::new(Forward(tx)));

        bus.fire_event(added(sound_card()));

        let device = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("handler must be invoked")
            .expect("channel open");
        assert_eq!(device, sound_card());
    }

    #[tokio::test]
    async fn remove_listener_ignores_add_events() {
        let bus = EventBus::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _listener = bus.register_event(BusEvent::HardwareRemoveDevice, Arc::new(Forward(tx)));

        bus.fire_event(added(sound_card()));
        let result = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(result.is_err(), "remove listener must not see add events");

        bus.fire_event(removed(sound_card()));
        let device = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("remove event delivered")
            .expect("channel open");
        assert_eq!(device.name, "controlC0");
    }

    #[tokio::test]
    async fn same_handler_registered_twice_runs_twice() {
        let bus = EventBus::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler: Arc<dyn DeviceHandler> = Arc::new(Forward(tx));
        let _a = bus.register_event(BusEvent::HardwareNewDevice, handler.clone());
        let _b = bus.register_event(BusEvent::HardwareNewDevice, handler);
        assert_eq!(bus.listener_count(BusEvent::HardwareNewDevice), 2);

        bus.fire_event(added(sound_card()));
        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("both listeners deliver")
                .expect("channel open");
        }
    }

    #[tokio::test]
    async fn failing_handler_keeps_listening() {
        let bus = EventBus::default();
        let listener = bus.register_event(BusEvent::HardwareNewDevice, Arc::new(AlwaysFails));

        bus.fire_event(added(sound_card()));
        bus.fire_event(added(sound_card()));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!listener.is_finished());
        assert_eq!(listener.event(), BusEvent::HardwareNewDevice);
    }
}
