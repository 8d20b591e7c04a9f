use serde::{Deserialize, Serialize};

use super::id::RoomId;
use super::user::User;

/// Snapshot of a room and its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub users: Vec<User>,
}

impl Room {
    #[must_use]
    pub const fn new(id: RoomId) -> Self {
        Self {
            id,
            users: Vec::new(),
        }
    }
}
