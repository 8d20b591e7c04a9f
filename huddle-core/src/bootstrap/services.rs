//! Service initialization

use std::sync::Arc;

use tracing::info;

use crate::repository::{MemoryRoomRepository, RoomRepository};
use crate::service::RoomService;
use crate::Config;

/// Shared services handed to every transport
#[derive(Clone, Debug)]
pub struct Services {
    pub room_service: Arc<RoomService>,
}

/// Build the services backed by the in-memory room store
#[must_use]
pub fn init_services(config: &Config) -> Services {
    let repository: Arc<dyn RoomRepository> = Arc::new(MemoryRoomRepository::new());
    init_services_with(repository, config)
}

/// Build the services on top of an existing room store
#[must_use]
pub fn init_services_with(repository: Arc<dyn RoomRepository>, config: &Config) -> Services {
    let room_service = Arc::new(RoomService::new(repository, &config.rooms));

    info!(
        handoff_timeout_ms = config.rooms.handoff_timeout_ms,
        push_timeout_ms = config.rooms.push_timeout_ms,
        outbound_buffer = config.rooms.outbound_buffer,
        "Room service initialized"
    );

    Services { room_service }
}
