use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tracing::{debug, warn};

use super::events::RoomEvent;
use crate::models::{RoomId, User, UserId};
use crate::Error;

/// Items pushed to a member's connection. An `Err` terminates the stream.
pub type StreamItem = std::result::Result<RoomEvent, Error>;

pub type EventSender = mpsc::Sender<StreamItem>;
pub type EventReceiver = mpsc::Receiver<StreamItem>;

/// A live join-room connection
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub room_id: RoomId,
    pub user: User,
    pub sender: EventSender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The member has no registered stream
    NotConnected,
    /// The receiving side is gone
    Closed,
    /// The member's queue stayed full for the whole push timeout
    TimedOut,
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Closed => write!(f, "stream closed"),
            Self::TimedOut => write!(f, "push timed out"),
        }
    }
}

/// Outcome of one fan-out
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: Vec<(User, PushError)>,
    /// Addressed usernames that matched no current member
    pub unresolved: Vec<String>,
}

/// Where to push events for connected users.
///
/// Entries live exactly as long as one join-room connection. Membership is
/// owned by the room store; callers pass the current member list in and only
/// members with a live stream are reached.
#[derive(Clone, Default)]
pub struct StreamRegistry {
    streams: Arc<DashMap<UserId, Subscriber>>,
}

impl StreamRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the stream for `user`. Returns false if the id is already taken.
    pub fn register(&self, room_id: RoomId, user: User, sender: EventSender) -> bool {
        use dashmap::mapref::entry::Entry;

        match self.streams.entry(user.id.clone()) {
            Entry::Occupied(_) => {
                warn!(
                    room_id = %room_id,
                    user_id = %user.id,
                    "Stream already registered for user"
                );
                false
            }
            Entry::Vacant(slot) => {
                debug!(
                    room_id = %room_id,
                    user_id = %user.id,
                    username = %user.name,
                    "Stream registered"
                );
                slot.insert(Subscriber {
                    room_id,
                    user,
                    sender,
                });
                true
            }
        }
    }

    /// Remove the stream for `user_id`. Safe to call more than once.
    pub fn unregister(&self, user_id: &UserId) -> Option<Subscriber> {
        let removed = self.streams.remove(user_id).map(|(_, sub)| sub);
        if let Some(sub) = &removed {
            debug!(
                room_id = %sub.room_id,
                user_id = %user_id,
                "Stream unregistered"
            );
        }
        removed
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.streams.len()
    }

    /// Registered streams of the given members
    #[must_use]
    pub fn subscribers_for(&self, members: &[User]) -> Vec<Subscriber> {
        members
            .iter()
            .filter_map(|member| self.streams.get(&member.id).map(|sub| sub.value().clone()))
            .collect()
    }

    /// Push `event` to every member with a live stream.
    ///
    /// Pushes run concurrently and each one is bounded by `timeout`; a failed
    /// recipient never affects the others.
    pub async fn deliver(&self, members: &[User], event: &RoomEvent, timeout: Duration) -> DeliveryReport {
        let subscribers = self.subscribers_for(members);

        let pushes = subscribers.into_iter().map(|sub| async move {
            let outcome = push(&sub.sender, event.clone(), timeout).await;
            (sub.user, outcome)
        });

        let mut report = DeliveryReport::default();
        for (user, outcome) in futures::future::join_all(pushes).await {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(err) => report.failed.push((user, err)),
            }
        }

        debug!(
            event_type = event.event_type(),
            delivered = report.delivered,
            failed = report.failed.len(),
            "Event fan-out complete"
        );

        report
    }

    /// Push `event` to a single member.
    pub async fn deliver_to(&self, user: &User, event: RoomEvent, timeout: Duration) -> std::result::Result<(), PushError> {
        let sender = self
            .streams
            .get(&user.id)
            .map(|sub| sub.sender.clone())
            .ok_or(PushError::NotConnected)?;

        push(&sender, event, timeout).await
    }
}

async fn push(sender: &EventSender, event: RoomEvent, timeout: Duration) -> std::result::Result<(), PushError> {
    sender
        .send_timeout(Ok(event), timeout)
        .await
        .map_err(|err| match err {
            SendTimeoutError::Timeout(_) => PushError::TimedOut,
            SendTimeoutError::Closed(_) => PushError::Closed,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn chat(text: &str) -> RoomEvent {
        RoomEvent::MessageReceived {
            text: text.to_string(),
            username: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let registry = StreamRegistry::new();
        let room = RoomId::from("r1");
        let alice = User::new("alice");
        let (tx, _rx) = mpsc::channel(4);

        assert!(registry.register(room.clone(), alice.clone(), tx.clone()));
        assert!(!registry.register(room, alice.clone(), tx));
        assert_eq!(registry.subscribers_for(&[alice.clone()]).len(), 1);
        assert_eq!(registry.connection_count(), 1);

        assert!(registry.unregister(&alice.id).is_some());
        assert!(registry.unregister(&alice.id).is_none());
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_deliver_only_reaches_members() {
        let registry = StreamRegistry::new();
        let room = RoomId::from("r1");
        let alice = User::new("alice");
        let bob = User::new("bob");
        let (alice_tx, mut alice_rx) = mpsc::channel(4);
        let (bob_tx, mut bob_rx) = mpsc::channel(4);
        registry.register(room.clone(), alice.clone(), alice_tx);
        registry.register(room, bob.clone(), bob_tx);

        let report = registry.deliver(&[alice.clone()], &chat("hi"), TIMEOUT).await;

        assert_eq!(report.delivered, 1);
        assert!(report.failed.is_empty());
        assert_eq!(alice_rx.recv().await.unwrap().unwrap(), chat("hi"));
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_deliver_continues_past_closed_stream() {
        let registry = StreamRegistry::new();
        let room = RoomId::from("r1");
        let alice = User::new("alice");
        let bob = User::new("bob");
        let (alice_tx, alice_rx) = mpsc::channel(4);
        let (bob_tx, mut bob_rx) = mpsc::channel(4);
        registry.register(room.clone(), alice.clone(), alice_tx);
        registry.register(room, bob.clone(), bob_tx);
        drop(alice_rx);

        let report = registry
            .deliver(&[alice.clone(), bob.clone()], &chat("hi"), TIMEOUT)
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, vec![(alice, PushError::Closed)]);
        assert!(bob_rx.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_times_out() {
        let registry = StreamRegistry::new();
        let alice = User::new("alice");
        let (tx, _rx) = mpsc::channel(1);
        registry.register(RoomId::from("r1"), alice.clone(), tx);

        assert_eq!(registry.deliver_to(&alice, chat("1"), TIMEOUT).await, Ok(()));
        assert_eq!(
            registry.deliver_to(&alice, chat("2"), TIMEOUT).await,
            Err(PushError::TimedOut)
        );
    }

    #[tokio::test]
    async fn test_deliver_to_unknown_user() {
        let registry = StreamRegistry::new();
        let ghost = User::new("ghost");

        assert_eq!(
            registry.deliver_to(&ghost, chat("hi"), TIMEOUT).await,
            Err(PushError::NotConnected)
        );
    }
}
