use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

use super::notifier::{RoomListener, RoomNotifier};
use crate::config::RoomsConfig;
use crate::models::{Room, RoomId, User};
use crate::repository::RoomRepository;
use crate::sync::{DeliveryReport, EventSender, RoomEvent, RoomLocks, StreamRegistry};
use crate::{Error, Result};

/// One SDP payload addressed to a member by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpOffer {
    pub kind: String,
    pub sdp: String,
    pub to: String,
}

/// Room lifecycle and fan-out.
///
/// Every operation that reads or changes the members of a room runs under
/// that room's lock, including the pushes that follow it.
pub struct RoomService {
    repository: Arc<dyn RoomRepository>,
    registry: StreamRegistry,
    locks: RoomLocks,
    notifier: RoomNotifier,
    push_timeout: Duration,
    outbound_buffer: usize,
}

impl std::fmt::Debug for RoomService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomService")
            .field("connections", &self.registry.connection_count())
            .field("push_timeout", &self.push_timeout)
            .finish_non_exhaustive()
    }
}

impl RoomService {
    pub fn new(repository: Arc<dyn RoomRepository>, config: &RoomsConfig) -> Self {
        Self {
            repository,
            registry: StreamRegistry::new(),
            locks: RoomLocks::new(),
            notifier: RoomNotifier::new(config.handoff_timeout()),
            push_timeout: config.push_timeout(),
            outbound_buffer: config.outbound_buffer,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn push_timeout(&self) -> Duration {
        self.push_timeout
    }

    /// Queue depth to use for a member's outbound channel
    #[must_use]
    pub const fn outbound_buffer(&self) -> usize {
        self.outbound_buffer
    }

    /// Create a room and hand its id to a room listener.
    ///
    /// Fails with `Unavailable` when no listener takes the room in time. The
    /// room stays in the store in that case.
    pub async fn create_room(&self) -> Result<RoomId> {
        let room_id = self.repository.create_room().await.map_err(|e| {
            error!(error = %e, "Failed to create room");
            Error::internal(format!("failed to create room: {e}"))
        })?;

        self.notifier.announce(room_id.clone()).await?;

        info!(room_id = %room_id, "Room created");
        Ok(room_id)
    }

    /// Subscribe to rooms as they are created
    #[must_use]
    pub fn listen(&self) -> RoomListener {
        self.notifier.listener()
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>> {
        self.repository.get_rooms().await
    }

    pub async fn room_users(&self, room_id: &RoomId) -> Result<Vec<User>> {
        self.repository.get_room_users(room_id).await
    }

    /// Admit `username` into `room_id` and register `sender` as its stream.
    ///
    /// Nothing is registered unless every check passes. On success the
    /// refreshed member list has already been pushed to every member,
    /// including the newcomer.
    pub async fn join(self: &Arc<Self>, room_id: RoomId, username: String, sender: EventSender) -> Result<Membership> {
        self.admit(room_id, username).await?.activate(sender).await
    }

    /// Run the join checks and keep the room locked for the activation.
    ///
    /// Dropping the returned [`Admission`] releases the lock without joining.
    pub async fn admit(self: &Arc<Self>, room_id: RoomId, username: String) -> Result<Admission> {
        // Rooms are never deleted, so a room seen here still exists under the
        // lock. Unknown ids are rejected before a lock entry is created.
        self.admission_members(&room_id).await?;
        let guard = self.locks.lock(&room_id).await;

        let members = self.admission_members(&room_id).await?;
        if members.iter().any(|u| u.name == username) {
            return Err(Error::invalid_input("username already taken"));
        }

        let rooms = self.repository.get_rooms().await.map_err(|e| {
            error!(error = %e, "Failed to list rooms");
            Error::internal(format!("failed to list rooms: {e}"))
        })?;
        if !rooms.iter().any(|room| room.id == room_id) {
            return Err(Error::invalid_input("no such room"));
        }

        Ok(Admission {
            service: Arc::clone(self),
            room_id,
            username,
            _guard: guard,
        })
    }

    /// Remove `user` from the room and tell the remaining members.
    ///
    /// Best-effort: failures are logged, never returned.
    pub async fn leave(&self, room_id: &RoomId, user: &User) {
        let _guard = self.locks.lock(room_id).await;

        self.registry.unregister(&user.id);
        if let Err(e) = self.repository.leave_room(room_id, user).await {
            warn!(room_id = %room_id, username = %user.name, error = %e, "Failed to leave room");
        } else {
            info!(room_id = %room_id, user_id = %user.id, username = %user.name, "User left room");
        }

        self.broadcast_members(room_id).await;
    }

    /// Relay chat text from `from` to every current member of the room.
    pub async fn broadcast_message(&self, room_id: &RoomId, from: &User, text: String) -> Result<DeliveryReport> {
        let _guard = self.locks.lock(room_id).await;

        let members = self.current_members(room_id).await?;
        let event = RoomEvent::MessageReceived {
            text,
            username: from.name.clone(),
        };
        let report = self.registry.deliver(&members, &event, self.push_timeout).await;
        log_failures(room_id, &event, &report);

        Ok(report)
    }

    /// Relay each SDP entry to the member it is addressed to.
    ///
    /// Entries addressed to a name that is not in the room are dropped.
    pub async fn relay_sdp(&self, room_id: &RoomId, from: &User, offers: Vec<SdpOffer>) -> Result<DeliveryReport> {
        let _guard = self.locks.lock(room_id).await;

        let members = self.current_members(room_id).await?;
        let mut report = DeliveryReport::default();

        let mut pushes = Vec::with_capacity(offers.len());
        for offer in offers {
            let Some(target) = members.iter().find(|u| u.name == offer.to) else {
                warn!(
                    room_id = %room_id,
                    from = %from.name,
                    to = %offer.to,
                    "SDP addressee is not in the room, dropping"
                );
                report.unresolved.push(offer.to);
                continue;
            };

            let event = RoomEvent::SdpReceived {
                kind: offer.kind,
                sdp: offer.sdp,
                to: offer.to,
                from: from.name.clone(),
            };
            pushes.push(async move {
                let outcome = self.registry.deliver_to(target, event, self.push_timeout).await;
                (target, outcome)
            });
        }

        // The room stays locked for one push timeout at most, however many entries.
        for (target, outcome) in futures::future::join_all(pushes).await {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => report.failed.push((target.clone(), e)),
            }
        }

        for (user, e) in &report.failed {
            warn!(room_id = %room_id, to = %user.name, error = %e, "Failed to relay SDP");
        }

        Ok(report)
    }

    async fn admission_members(&self, room_id: &RoomId) -> Result<Vec<User>> {
        match self.repository.get_room_users(room_id).await {
            Ok(members) => Ok(members),
            Err(Error::NotFound(_)) => Err(Error::invalid_input("no such room")),
            Err(e) => {
                error!(room_id = %room_id, error = %e, "Failed to read room members");
                Err(Error::internal(format!("failed to read room members: {e}")))
            }
        }
    }

    async fn current_members(&self, room_id: &RoomId) -> Result<Vec<User>> {
        self.repository.get_room_users(room_id).await.map_err(|e| {
            error!(room_id = %room_id, error = %e, "Failed to read room members");
            Error::internal(format!("failed to read room members: {e}"))
        })
    }

    /// Push the member list to every member. Caller holds the room lock.
    async fn broadcast_members(&self, room_id: &RoomId) {
        let members = match self.repository.get_room_users(room_id).await {
            Ok(members) => members,
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "Failed to read members for broadcast");
                return;
            }
        };

        let event = RoomEvent::RoomUsers(members.clone());
        let report = self.registry.deliver(&members, &event, self.push_timeout).await;
        log_failures(room_id, &event, &report);
    }
}

fn log_failures(room_id: &RoomId, event: &RoomEvent, report: &DeliveryReport) {
    for (user, e) in &report.failed {
        warn!(
            room_id = %room_id,
            to = %user.name,
            event_type = event.event_type(),
            error = %e,
            "Failed to push event"
        );
    }
    debug!(
        room_id = %room_id,
        event_type = event.event_type(),
        delivered = report.delivered,
        "Broadcast done"
    );
}

/// A join that passed validation and still holds the room lock
pub struct Admission {
    service: Arc<RoomService>,
    room_id: RoomId,
    username: String,
    _guard: OwnedMutexGuard<()>,
}

impl Admission {
    /// Register the stream, add the user to the store and broadcast the
    /// refreshed member list. The room lock is released afterwards.
    pub async fn activate(self, sender: EventSender) -> Result<Membership> {
        let Self {
            service,
            room_id,
            username,
            _guard,
        } = self;

        let user = User::new(username);
        if !service.registry.register(room_id.clone(), user.clone(), sender) {
            return Err(Error::internal("stream already registered"));
        }
        if let Err(e) = service.repository.join_room(&room_id, user.clone()).await {
            service.registry.unregister(&user.id);
            error!(room_id = %room_id, username = %user.name, error = %e, "Failed to join room");
            return Err(Error::internal(format!("failed to join room: {e}")));
        }

        info!(room_id = %room_id, user_id = %user.id, username = %user.name, "User joined room");
        service.broadcast_members(&room_id).await;

        Ok(Membership {
            service,
            room_id,
            user,
            released: false,
        })
    }
}

/// A user's place in a room for the lifetime of one connection.
///
/// Call [`Membership::release`] when the connection ends. If the value is
/// dropped without it, the leave is scheduled on the runtime instead.
pub struct Membership {
    service: Arc<RoomService>,
    room_id: RoomId,
    user: User,
    released: bool,
}

impl Membership {
    #[must_use]
    pub const fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }

    pub async fn send_message(&self, text: String) -> Result<DeliveryReport> {
        self.service.broadcast_message(&self.room_id, &self.user, text).await
    }

    pub async fn send_sdp(&self, offers: Vec<SdpOffer>) -> Result<DeliveryReport> {
        self.service.relay_sdp(&self.room_id, &self.user, offers).await
    }

    /// Leave the room and re-broadcast the member list.
    pub async fn release(mut self) {
        self.released = true;
        self.service.leave(&self.room_id, &self.user).await;
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let service = Arc::clone(&self.service);
        let room_id = self.room_id.clone();
        let user = self.user.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(room_id = %room_id, username = %user.name, "Membership dropped, scheduling leave");
                handle.spawn(async move { service.leave(&room_id, &user).await });
            }
            Err(_) => {
                // No runtime left to run the leave on; at least free the stream.
                service.registry.unregister(&user.id);
                warn!(room_id = %room_id, username = %user.name, "Membership dropped outside a runtime");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryRoomRepository, MockRoomRepository};
    use crate::sync::EventReceiver;
    use tokio::sync::mpsc;

    fn config() -> RoomsConfig {
        RoomsConfig {
            handoff_timeout_ms: 200,
            push_timeout_ms: 100,
            outbound_buffer: 16,
        }
    }

    fn service() -> Arc<RoomService> {
        Arc::new(RoomService::new(Arc::new(MemoryRoomRepository::new()), &config()))
    }

    async fn room(service: &Arc<RoomService>) -> RoomId {
        let mut listener = service.listen();
        let task = tokio::spawn(async move { listener.next().await });
        let room_id = service.create_room().await.unwrap();
        assert_eq!(task.await.unwrap(), Some(room_id.clone()));
        room_id
    }

    async fn join(service: &Arc<RoomService>, room_id: &RoomId, name: &str) -> Result<(Membership, EventReceiver)> {
        let (tx, rx) = mpsc::channel(16);
        let membership = service.join(room_id.clone(), name.to_string(), tx).await?;
        Ok((membership, rx))
    }

    async fn next_event(rx: &mut EventReceiver) -> RoomEvent {
        rx.recv().await.unwrap().unwrap()
    }

    fn names(event: &RoomEvent) -> Vec<String> {
        let RoomEvent::RoomUsers(users) = event else {
            panic!("expected room users, got {event:?}");
        };
        let mut names: Vec<String> = users.iter().map(|u| u.name.clone()).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_join_chat_leave_scenario() {
        let service = service();
        let room_id = room(&service).await;

        let (alice, mut alice_rx) = join(&service, &room_id, "alice").await.unwrap();
        assert_eq!(names(&next_event(&mut alice_rx).await), vec!["alice"]);

        let (bob, mut bob_rx) = join(&service, &room_id, "bob").await.unwrap();
        assert_eq!(names(&next_event(&mut alice_rx).await), vec!["alice", "bob"]);
        assert_eq!(names(&next_event(&mut bob_rx).await), vec!["alice", "bob"]);

        let report = alice.send_message("hi".to_string()).await.unwrap();
        assert_eq!(report.delivered, 2);
        let expected = RoomEvent::MessageReceived {
            text: "hi".to_string(),
            username: "alice".to_string(),
        };
        assert_eq!(next_event(&mut bob_rx).await, expected);
        assert_eq!(next_event(&mut alice_rx).await, expected);

        bob.release().await;
        assert_eq!(names(&next_event(&mut alice_rx).await), vec!["alice"]);
        assert_eq!(service.registry().connection_count(), 1);
        assert_eq!(service.room_users(&room_id).await.unwrap().len(), 1);

        alice.release().await;
        assert_eq!(service.registry().connection_count(), 0);
        assert!(service.room_users(&room_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_join_missing_room() {
        let service = service();
        let err = join(&service, &RoomId::from("missing"), "alice").await.err().unwrap();

        assert_eq!(err, Error::invalid_input("no such room"));
        assert_eq!(service.registry().connection_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_joins_leave_no_lock_entries() {
        let service = service();

        for i in 0..1000 {
            let err = join(&service, &RoomId::from(format!("bogus-{i}")), "alice")
                .await
                .err()
                .unwrap();
            assert_eq!(err, Error::invalid_input("no such room"));
        }

        assert_eq!(service.locks.len(), 0);
        assert_eq!(service.registry().connection_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let service = service();
        let room_id = room(&service).await;

        let (_alice, _rx) = join(&service, &room_id, "alice").await.unwrap();
        let err = join(&service, &room_id, "alice").await.err().unwrap();

        assert_eq!(err, Error::invalid_input("username already taken"));
        assert_eq!(service.room_users(&room_id).await.unwrap().len(), 1);
        assert_eq!(service.registry().connection_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_joins() {
        let service = service();
        let room_id = room(&service).await;

        let (a, b) = tokio::join!(
            join(&service, &room_id, "alice"),
            join(&service, &room_id, "alice")
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(e) if *e == Error::invalid_input("username already taken"))));
        assert_eq!(service.room_users(&room_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sdp_reaches_only_addressee() {
        let service = service();
        let room_id = room(&service).await;
        let (alice, mut alice_rx) = join(&service, &room_id, "alice").await.unwrap();
        let (_bob, mut bob_rx) = join(&service, &room_id, "bob").await.unwrap();
        let (_carol, mut carol_rx) = join(&service, &room_id, "carol").await.unwrap();
        while alice_rx.try_recv().is_ok() {}
        while bob_rx.try_recv().is_ok() {}
        while carol_rx.try_recv().is_ok() {}

        let report = alice
            .send_sdp(vec![
                SdpOffer {
                    kind: "offer".to_string(),
                    sdp: "v=0".to_string(),
                    to: "bob".to_string(),
                },
                SdpOffer {
                    kind: "offer".to_string(),
                    sdp: "v=0".to_string(),
                    to: "dave".to_string(),
                },
            ])
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.unresolved, vec!["dave".to_string()]);
        assert_eq!(
            next_event(&mut bob_rx).await,
            RoomEvent::SdpReceived {
                kind: "offer".to_string(),
                sdp: "v=0".to_string(),
                to: "bob".to_string(),
                from: "alice".to_string(),
            }
        );
        assert!(carol_rx.try_recv().is_err());
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sdp_to_stalled_peer_waits_one_timeout() {
        let service = service();
        let room_id = room(&service).await;
        // Bob's single slot is taken by his own member list and never drained.
        let (bob_tx, _bob_rx) = mpsc::channel(1);
        let _bob = service.join(room_id.clone(), "bob".to_string(), bob_tx).await.unwrap();
        let (alice, mut alice_rx) = join(&service, &room_id, "alice").await.unwrap();
        while alice_rx.try_recv().is_ok() {}

        let offers = (0..5)
            .map(|i| SdpOffer {
                kind: "candidate".to_string(),
                sdp: format!("a={i}"),
                to: "bob".to_string(),
            })
            .collect();
        let started = tokio::time::Instant::now();
        let report = alice.send_sdp(offers).await.unwrap();

        assert_eq!(report.failed.len(), 5);
        assert!(report.failed.iter().all(|(_, e)| *e == crate::sync::PushError::TimedOut));
        assert!(started.elapsed() < service.push_timeout() * 2);
    }

    #[tokio::test]
    async fn test_closed_peer_does_not_fail_broadcast() {
        let service = service();
        let room_id = room(&service).await;
        let (alice, mut alice_rx) = join(&service, &room_id, "alice").await.unwrap();
        let (_bob, bob_rx) = join(&service, &room_id, "bob").await.unwrap();
        drop(bob_rx);
        while alice_rx.try_recv().is_ok() {}

        let report = alice.send_message("still here".to_string()).await.unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(next_event(&mut alice_rx).await, RoomEvent::MessageReceived { .. }));
    }

    #[tokio::test]
    async fn test_dropped_membership_leaves_room() {
        let service = service();
        let room_id = room(&service).await;
        let (alice, mut alice_rx) = join(&service, &room_id, "alice").await.unwrap();
        let (bob, _bob_rx) = join(&service, &room_id, "bob").await.unwrap();
        while alice_rx.try_recv().is_ok() {}

        drop(bob);

        assert_eq!(names(&next_event(&mut alice_rx).await), vec!["alice"]);
        assert_eq!(service.room_users(&room_id).await.unwrap().len(), 1);
        alice.release().await;
    }

    #[tokio::test]
    async fn test_dropped_admission_unlocks_room() {
        let service = service();
        let room_id = room(&service).await;

        let admission = service.admit(room_id.clone(), "alice".to_string()).await.unwrap();
        drop(admission);

        let (_alice, mut rx) = join(&service, &room_id, "alice").await.unwrap();
        assert_eq!(names(&next_event(&mut rx).await), vec!["alice"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_room_without_listener() {
        let repo = Arc::new(MemoryRoomRepository::new());
        let service = RoomService::new(repo.clone(), &RoomsConfig::default());

        let err = service.create_room().await.unwrap_err();

        assert!(matches!(err, Error::Unavailable(_)));
        assert_eq!(repo.room_count(), 1);
    }

    #[tokio::test]
    async fn test_store_read_failure_is_internal() {
        let mut repo = MockRoomRepository::new();
        repo.expect_get_room_users()
            .returning(|_| Err(Error::internal("disk on fire")));
        let service = Arc::new(RoomService::new(Arc::new(repo), &config()));
        let (tx, _rx) = mpsc::channel(1);

        let err = service
            .join(RoomId::from("r1"), "alice".to_string(), tx)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(service.registry().connection_count(), 0);
    }

    #[tokio::test]
    async fn test_store_write_failure_rolls_back_registration() {
        let mut repo = MockRoomRepository::new();
        repo.expect_get_room_users().returning(|_| Ok(Vec::new()));
        repo.expect_get_rooms()
            .returning(|| Ok(vec![Room::new(RoomId::from("r1"))]));
        repo.expect_join_room()
            .returning(|_, _| Err(Error::internal("write failed")));
        let service = Arc::new(RoomService::new(Arc::new(repo), &config()));
        let (tx, _rx) = mpsc::channel(1);

        let err = service
            .join(RoomId::from("r1"), "alice".to_string(), tx)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(service.registry().connection_count(), 0);
    }
}
