use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::models::RoomId;
use crate::{Error, Result};

/// A room id waiting for a listener to take it
#[derive(Debug)]
struct Handoff {
    room_id: RoomId,
    accepted: oneshot::Sender<()>,
}

/// Rendezvous between room creation and the room listeners.
///
/// `announce` only succeeds once a listener has taken the room id. Listeners
/// share one queue, so every room goes to exactly one of them. A hand-off the
/// creator gave up on is dropped by the listener instead of being announced.
#[derive(Clone)]
pub struct RoomNotifier {
    tx: mpsc::Sender<Handoff>,
    rx: Arc<Mutex<mpsc::Receiver<Handoff>>>,
    timeout: Duration,
}

impl RoomNotifier {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            timeout,
        }
    }

    /// Hand `room_id` to a listener, waiting at most the configured timeout.
    pub async fn announce(&self, room_id: RoomId) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        let (accepted, mut ack) = oneshot::channel();

        let handoff = Handoff {
            room_id: room_id.clone(),
            accepted,
        };
        match tokio::time::timeout_at(deadline, self.tx.send(handoff)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(Error::internal("room notifier closed")),
            Err(_) => return Err(no_listener(&room_id)),
        }

        tokio::select! {
            res = &mut ack => res.map_err(|_| no_listener(&room_id)),
            () = tokio::time::sleep_until(deadline) => {
                // A listener may have accepted right at the deadline.
                ack.close();
                ack.try_recv().map_err(|_| no_listener(&room_id))
            }
        }
    }

    #[must_use]
    pub fn listener(&self) -> RoomListener {
        RoomListener {
            rx: Arc::clone(&self.rx),
        }
    }
}

fn no_listener(room_id: &RoomId) -> Error {
    warn!(room_id = %room_id, "No room listener accepted the new room in time");
    Error::unavailable("couldn't send the room to a coordinator")
}

/// One subscriber of the new-room announcements
pub struct RoomListener {
    rx: Arc<Mutex<mpsc::Receiver<Handoff>>>,
}

impl RoomListener {
    /// Wait for the next room a creator is still waiting on.
    ///
    /// Cancel safe: dropping the future never loses an accepted room.
    pub async fn next(&mut self) -> Option<RoomId> {
        loop {
            let handoff = {
                let mut rx = self.rx.lock().await;
                rx.recv().await?
            };

            if handoff.accepted.send(()).is_ok() {
                return Some(handoff.room_id);
            }
            debug!(room_id = %handoff.room_id, "Discarding abandoned room hand-off");
        }
    }
}
