//! `hostcore-middleware` – Hardware Event Bus
//!
//! Routes hot-plug notifications from the hardware registry to whichever
//! component registered interest, without caring what the device is.
//!
//! # Modules
//!
//! - [`bus`] – Typed, topic-based publish/subscribe bus built on Tokio
//!   broadcast channels, plus [`register_event`][bus::EventBus::register_event]
//!   which binds an async [`DeviceHandler`] to a [`BusEvent`] topic.

pub mod bus;

pub use bus::{BusEvent, DeviceHandler, EventBus, EventReceiver, Listener};
