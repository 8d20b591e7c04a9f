use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::RoomId;

/// One exclusive lock per room.
///
/// Membership reads, store writes, registry changes and fan-out for a room all
/// happen while holding its guard, so a username check and the join that
/// follows it cannot interleave with another join or leave.
#[derive(Clone, Default)]
pub struct RoomLocks {
    locks: Arc<DashMap<RoomId, Arc<Mutex<()>>>>,
}

impl RoomLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, room_id: &RoomId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is released before awaiting.
        let mutex = self.locks.entry(room_id.clone()).or_default().clone();
        mutex.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
