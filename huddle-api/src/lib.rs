//! Transports for the Huddle signaling server
//!
//! - `impls`: transport-agnostic session and stream logic
//! - `grpc`: the `RoomsService` tonic implementation
//! - `http`: REST and WebSocket gateway over the same logic

pub mod grpc;
pub mod http;
pub mod impls;
