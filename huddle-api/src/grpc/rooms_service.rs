use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use huddle_core::service::RoomService;
use huddle_core::{Error, Result as CoreResult};
use huddle_proto::rooms::{
    CreateRoomRequest, CreateRoomResponse, ListenForRoomsRequest, NewRoomNotification, Ping, Pong,
    RoomMethod,
};
use huddle_proto::RoomsService;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, error, info};

use super::metadata;
use crate::impls::{convert, pingpong, spawn_room_announcements, InboundFrames, SignalingSession};

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Inbound frames of a `JoinRoom` call
struct GrpcInbound {
    stream: Streaming<RoomMethod>,
}

#[async_trait]
impl InboundFrames for GrpcInbound {
    async fn recv(&mut self) -> Option<CoreResult<RoomMethod>> {
        match self.stream.message().await {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(status) if status.code() == tonic::Code::Cancelled => None,
            Err(status) => Some(Err(Error::internal(format!(
                "failed to receive frame: {}",
                status.message()
            )))),
        }
    }
}

/// `RoomsService` backed by the shared [`RoomService`]
#[derive(Clone)]
pub struct RoomsServiceImpl {
    room_service: Arc<RoomService>,
}

impl RoomsServiceImpl {
    #[must_use]
    pub const fn new(room_service: Arc<RoomService>) -> Self {
        Self { room_service }
    }
}

#[async_trait]
impl RoomsService for RoomsServiceImpl {
    async fn create_room(
        &self,
        _request: Request<CreateRoomRequest>,
    ) -> Result<Response<CreateRoomResponse>, Status> {
        let room_id = self.room_service.create_room().await?;
        Ok(Response::new(CreateRoomResponse {
            room_id: room_id.to_string(),
        }))
    }

    type JoinRoomStream = ResponseStream<RoomMethod>;

    async fn join_room(
        &self,
        request: Request<Streaming<RoomMethod>>,
    ) -> Result<Response<Self::JoinRoomStream>, Status> {
        let join = metadata::join_request(request.metadata());
        let (session, outbound) = SignalingSession::open(&self.room_service, join).await?;

        let mut inbound = GrpcInbound {
            stream: request.into_inner(),
        };
        tokio::spawn(async move {
            if let Err(e) = session.run(&mut inbound).await {
                debug!(error = %e, "JoinRoom stream ended with error");
            }
        });

        let stream = ReceiverStream::new(outbound)
            .map(|item| item.map(convert::event_to_frame).map_err(Status::from));
        Ok(Response::new(Box::pin(stream)))
    }

    type ListenForRoomsStream = ResponseStream<NewRoomNotification>;

    async fn listen_for_rooms(
        &self,
        _request: Request<ListenForRoomsRequest>,
    ) -> Result<Response<Self::ListenForRoomsStream>, Status> {
        let rooms = spawn_room_announcements(&self.room_service);

        let stream = ReceiverStream::new(rooms).map(|room_id| {
            Ok(NewRoomNotification {
                room_id: room_id.to_string(),
            })
        });
        Ok(Response::new(Box::pin(stream)))
    }

    type PingPongStream = ResponseStream<Pong>;

    async fn ping_pong(
        &self,
        request: Request<Streaming<Ping>>,
    ) -> Result<Response<Self::PingPongStream>, Status> {
        let mut pings = request.into_inner();
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            loop {
                match pings.message().await {
                    Ok(Some(ping)) => {
                        if tx.send(Ok(pingpong::pong(ping))).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(status) => {
                        error!(error = %status, "PingPong receive failed");
                        let _ = tx.send(Err(Status::internal(status.message().to_string()))).await;
                        break;
                    }
                }
            }
            info!("PingPong stream closed");
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}
