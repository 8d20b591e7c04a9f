//! REST and WebSocket gateway
//!
//! Routes:
//! - `GET /health`
//! - `POST /rooms`, `GET /rooms`
//! - `GET /rooms/join?username=..&room_id=..` (WebSocket)
//! - `GET /rooms/listen` (WebSocket)
//! - `GET /ping-pong` (WebSocket)

pub mod error;
pub mod health;
pub mod rooms;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use huddle_core::bootstrap::Services;
use huddle_core::service::RoomService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub room_service: Arc<RoomService>,
}

/// Create the HTTP router with all routes
pub fn create_router(services: &Services) -> Router {
    let state = AppState {
        room_service: services.room_service.clone(),
    };

    Router::new()
        .merge(health::create_health_router())
        .merge(rooms::create_rooms_router())
        .merge(websocket::create_websocket_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
