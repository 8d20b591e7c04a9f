//! Join-room session
//!
//! One session per join-room connection, whatever carries it. A session
//! moves through `Connecting -> Authenticating -> Validated -> Active ->
//! Terminated`; the transport supplies the inbound frames and drains the
//! outbound channel returned by [`SignalingSession::open`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use huddle_core::models::{RoomId, User};
use huddle_core::service::{Membership, RoomService};
use huddle_core::sync::{EventReceiver, EventSender};
use huddle_core::{Error, Result};
use huddle_proto::rooms::{room_method::Method, RoomMethod};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

use super::convert;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Stream open, identity not looked at yet
    Connecting,
    /// Identity present, room checks pending
    Authenticating,
    /// Checks passed, not yet registered
    Validated,
    /// Registered and relaying frames
    Active,
    Terminated,
}

/// Identity sent out-of-band when the stream opens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinRequest {
    pub username: Option<String>,
    pub room_id: Option<String>,
}

/// Inbound half of a join-room connection
#[async_trait]
pub trait InboundFrames: Send {
    /// Next client frame, `None` once the client closed its side cleanly.
    async fn recv(&mut self) -> Option<Result<RoomMethod>>;
}

pub struct SignalingSession {
    membership: Option<Membership>,
    outbound: EventSender,
    push_timeout: Duration,
    state: SessionState,
}

fn log_transition(from: SessionState, to: SessionState) {
    debug!(from = ?from, to = ?to, "Session state changed");
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl SignalingSession {
    /// Validate the join and activate it.
    ///
    /// Any error is returned before the user is registered or added to the
    /// room. On success the caller must drain the receiver and drive
    /// [`SignalingSession::run`].
    pub async fn open(room_service: &Arc<RoomService>, request: JoinRequest) -> Result<(Self, EventReceiver)> {
        let username = present(request.username).ok_or_else(|| Error::invalid_input("missing username"))?;
        let room_id = present(request.room_id).ok_or_else(|| Error::invalid_input("missing room id"))?;
        log_transition(SessionState::Connecting, SessionState::Authenticating);

        let admission = room_service
            .admit(RoomId::from(room_id), username)
            .await
            .inspect_err(|e| info!(error = %e, "Join rejected"))?;
        log_transition(SessionState::Authenticating, SessionState::Validated);

        let (tx, rx) = mpsc::channel(room_service.outbound_buffer());
        let membership = admission.activate(tx.clone()).await?;
        log_transition(SessionState::Validated, SessionState::Active);

        let session = Self {
            membership: Some(membership),
            outbound: tx,
            push_timeout: room_service.push_timeout(),
            state: SessionState::Active,
        };
        Ok((session, rx))
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.membership.as_ref().map(Membership::user)
    }

    /// Relay inbound frames until the connection ends, then leave the room.
    ///
    /// The leave and the member-list broadcast run on every exit path. A
    /// failure is also pushed to the outbound channel as its last item.
    pub async fn run<I>(mut self, inbound: &mut I) -> Result<()>
    where
        I: InboundFrames + ?Sized,
    {
        let span = match &self.membership {
            Some(m) => info_span!("join_room", room_id = %m.room_id(), username = %m.user().name),
            None => info_span!("join_room"),
        };

        async move {
            info!("Session active");
            let result = self.relay(inbound).await;
            self.terminate(&result).await;
            result
        }
        .instrument(span)
        .await
    }

    async fn relay<I>(&self, inbound: &mut I) -> Result<()>
    where
        I: InboundFrames + ?Sized,
    {
        loop {
            let frame = tokio::select! {
                frame = inbound.recv() => frame,
                () = self.outbound.closed() => {
                    debug!("Client stopped reading");
                    return Ok(());
                }
            };

            match frame {
                None => {
                    info!("Client closed the stream");
                    return Ok(());
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to receive frame");
                    return Err(e);
                }
                Some(Ok(frame)) => self.handle(frame).await?,
            }
        }
    }

    async fn handle(&self, frame: RoomMethod) -> Result<()> {
        let membership = self
            .membership
            .as_ref()
            .ok_or_else(|| Error::internal("session already terminated"))?;

        let report = match frame.method {
            Some(Method::SendMessage(message)) => membership.send_message(message.text).await?,
            Some(Method::SendSdp(sdp)) => membership.send_sdp(convert::sdp_offers(sdp.sdp)).await?,
            _ => return Err(Error::invalid_input("invalid method")),
        };

        debug!(
            delivered = report.delivered,
            failed = report.failed.len(),
            unresolved = report.unresolved.len(),
            "Frame relayed"
        );
        Ok(())
    }

    async fn terminate(&mut self, result: &Result<()>) {
        log_transition(self.state, SessionState::Terminated);
        self.state = SessionState::Terminated;

        if let Some(membership) = self.membership.take() {
            membership.release().await;
        }

        if let Err(e) = result {
            if self
                .outbound
                .send_timeout(Err(e.clone()), self.push_timeout)
                .await
                .is_err()
            {
                debug!(error = %e, "Could not report session error to client");
            }
        }
        info!(ok = result.is_ok(), "Session terminated");
    }
}
