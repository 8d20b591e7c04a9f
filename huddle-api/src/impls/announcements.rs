use huddle_core::models::RoomId;
use huddle_core::service::RoomService;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Feed newly created rooms into a channel until its receiver goes away.
///
/// Each subscriber gets its own task; the task ends as soon as the receiver
/// is dropped, even while waiting for the next room.
#[must_use]
pub fn spawn_room_announcements(room_service: &RoomService) -> mpsc::Receiver<RoomId> {
    let (tx, rx) = mpsc::channel(1);
    let mut listener = room_service.listen();

    tokio::spawn(async move {
        info!("Room listener subscribed");
        loop {
            tokio::select! {
                () = tx.closed() => {
                    debug!("Room listener went away");
                    break;
                }
                room = listener.next() => {
                    let Some(room_id) = room else { break };
                    if let Err(e) = tx.send(room_id).await {
                        warn!(room_id = %e.0, "Room accepted but listener is gone");
                        break;
                    }
                }
            }
        }
        info!("Room listener unsubscribed");
    });

    rx
}

