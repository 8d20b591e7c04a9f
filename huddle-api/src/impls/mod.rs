//! Logic shared by the gRPC and WebSocket transports

pub mod announcements;
pub mod convert;
pub mod pingpong;
pub mod signaling;

pub use announcements::spawn_room_announcements;
pub use signaling::{InboundFrames, SessionState, SignalingSession};
