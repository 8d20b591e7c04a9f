//! Core of the Huddle signaling server: rooms, members and fan-out.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod repository;
pub mod service;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
