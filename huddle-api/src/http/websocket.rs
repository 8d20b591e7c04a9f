//! WebSocket endpoints
//!
//! Frames are JSON text in both directions. `/rooms/join` also accepts
//! binary frames holding a protobuf `RoomMethod`. The join session and the
//! room announcements are the same code the gRPC service runs.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::IntoResponse,
    routing::any,
    Router,
};
use futures::{stream::SplitStream, SinkExt, StreamExt};
use huddle_core::sync::EventReceiver;
use huddle_core::{Error, Result as CoreResult};
use huddle_proto::rooms::{NewRoomNotification, Ping, RoomMethod};
use prost::Message as _;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::AppResult;
use super::AppState;
use crate::impls::signaling::JoinRequest;
use crate::impls::{convert, pingpong, spawn_room_announcements, InboundFrames, SignalingSession};

/// Signaling frames are small
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

pub fn create_websocket_router() -> Router<AppState> {
    Router::new()
        .route("/rooms/join", any(join_room_handler))
        .route("/rooms/listen", any(listen_for_rooms_handler))
        .route("/ping-pong", any(ping_pong_handler))
}

/// Query parameters for `/rooms/join`, equivalent to the
/// `Username` / `Room-Id` headers
#[derive(Debug, Default, Deserialize)]
pub struct JoinQuery {
    pub username: Option<String>,
    pub room_id: Option<String>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// Query parameters win over headers
fn join_request(query: JoinQuery, headers: &HeaderMap) -> JoinRequest {
    JoinRequest {
        username: query.username.or_else(|| header(headers, "username")),
        room_id: query
            .room_id
            .or_else(|| header(headers, "room-id"))
            .or_else(|| header(headers, "room_id")),
    }
}

fn close_frame(err: &Error) -> CloseFrame {
    let code = match err {
        Error::InvalidInput(_) | Error::NotFound(_) | Error::MemberNotFound(_) => close_code::POLICY,
        Error::Unavailable(_) => close_code::AGAIN,
        Error::Internal(_) => close_code::ERROR,
    };
    CloseFrame {
        code,
        reason: err.to_string().into(),
    }
}

/// Join a room over WebSocket.
///
/// The join is validated before the upgrade, so a rejected join is a plain
/// HTTP error response.
pub async fn join_room_handler(
    State(state): State<AppState>,
    Query(query): Query<JoinQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let request = join_request(query, &headers);
    let (session, outbound) = SignalingSession::open(&state.room_service, request).await?;

    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_join_socket(socket, session, outbound)))
}

/// Inbound frames of a join socket
struct WebSocketInbound {
    receiver: SplitStream<WebSocket>,
}

#[async_trait::async_trait]
impl InboundFrames for WebSocketInbound {
    async fn recv(&mut self) -> Option<CoreResult<RoomMethod>> {
        loop {
            match self.receiver.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(
                        serde_json::from_str::<RoomMethod>(text.as_str())
                            .map_err(|e| Error::invalid_input(format!("malformed frame: {e}"))),
                    );
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return Some(
                        RoomMethod::decode(bytes)
                            .map_err(|e| Error::invalid_input(format!("malformed frame: {e}"))),
                    );
                }
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(e)) => return Some(Err(Error::internal(format!("websocket error: {e}")))),
                // ping/pong are answered by axum
                Some(Ok(_)) => {}
            }
        }
    }
}

async fn handle_join_socket(socket: WebSocket, session: SignalingSession, mut outbound: EventReceiver) {
    let (mut sink, receiver) = socket.split();

    // Server events -> socket. Ends when the session drops its senders or
    // the socket stops accepting frames.
    let forward = tokio::spawn(async move {
        while let Some(item) = outbound.recv().await {
            let message = match item {
                Ok(event) => match serde_json::to_string(&convert::event_to_frame(event)) {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        warn!(error = %e, "Failed to encode frame");
                        continue;
                    }
                },
                Err(err) => {
                    let _ = sink.send(Message::Close(Some(close_frame(&err)))).await;
                    break;
                }
            };
            if let Err(e) = sink.send(message).await {
                debug!(error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let mut inbound = WebSocketInbound { receiver };
    if let Err(e) = session.run(&mut inbound).await {
        debug!(error = %e, "WebSocket join session ended with error");
    }
    let _ = forward.await;
}

/// Push new rooms to a WebSocket subscriber
pub async fn listen_for_rooms_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_listen_socket(socket, state))
}

async fn handle_listen_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut receiver) = socket.split();
    let mut rooms = spawn_room_announcements(&state.room_service);
    info!("WebSocket room listener connected");

    loop {
        tokio::select! {
            room = rooms.recv() => {
                let Some(room_id) = room else { break };
                let notification = NewRoomNotification { room_id: room_id.to_string() };
                let Ok(json) = serde_json::to_string(&notification) else { continue };
                if sink.send(Message::Text(json.into())).await.is_err() {
                    warn!(room_id = %room_id, "Room announced to a listener that just left");
                    break;
                }
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("WebSocket room listener disconnected");
}

/// Echo `{"counter": n}` as `{"counter": n + 1}`
pub async fn ping_pong_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(handle_ping_pong_socket)
}

async fn handle_ping_pong_socket(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            if matches!(message, Message::Close(_)) {
                break;
            }
            continue;
        };

        let reply = match serde_json::from_str::<Ping>(text.as_str()) {
            Ok(ping) => serde_json::to_string(&pingpong::pong(ping)),
            Err(e) => {
                let reason = format!("malformed ping: {e}");
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::POLICY,
                        reason: reason.into(),
                    })))
                    .await;
                break;
            }
        };

        match reply {
            Ok(json) => {
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to encode pong");
                break;
            }
        }
    }
}
