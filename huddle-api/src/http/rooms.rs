//! REST endpoints for rooms

use axum::{extract::State, routing::get, Json, Router};
use huddle_proto::rooms::{CreateRoomResponse, User};
use serde::{Deserialize, Serialize};

use super::error::AppResult;
use super::AppState;
use crate::impls::convert;

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomView {
    pub room_id: String,
    pub users: Vec<User>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomView>,
}

pub fn create_rooms_router() -> Router<AppState> {
    Router::new().route("/rooms", get(list_rooms).post(create_room))
}

/// Create a room; 503 when no room listener takes it in time
pub async fn create_room(State(state): State<AppState>) -> AppResult<Json<CreateRoomResponse>> {
    let room_id = state.room_service.create_room().await?;
    Ok(Json(CreateRoomResponse {
        room_id: room_id.to_string(),
    }))
}

pub async fn list_rooms(State(state): State<AppState>) -> AppResult<Json<RoomsResponse>> {
    let rooms = state
        .room_service
        .list_rooms()
        .await?
        .into_iter()
        .map(|room| RoomView {
            room_id: room.id.to_string(),
            users: room.users.iter().map(convert::proto_user).collect(),
        })
        .collect();

    Ok(Json(RoomsResponse { rooms }))
}
