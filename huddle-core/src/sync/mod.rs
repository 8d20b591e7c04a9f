//! Runtime-only state for live connections

pub mod events;
pub mod room_locks;
pub mod stream_registry;

pub use events::RoomEvent;
pub use room_locks::RoomLocks;
pub use stream_registry::{
    DeliveryReport, EventReceiver, EventSender, PushError, StreamItem, StreamRegistry, Subscriber,
};
