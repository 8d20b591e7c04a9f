use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::RoomRepository;
use crate::models::{Room, RoomId, User};
use crate::{Error, Result};

/// In-process room store
#[derive(Debug, Default)]
pub struct MemoryRoomRepository {
    rooms: RwLock<HashMap<RoomId, Vec<User>>>,
}

impl MemoryRoomRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }
}

fn room_not_found(room_id: &RoomId) -> Error {
    Error::NotFound(format!("room {room_id} not found"))
}

#[async_trait]
impl RoomRepository for MemoryRoomRepository {
    async fn create_room(&self) -> Result<RoomId> {
        let room_id = RoomId::new();
        self.rooms.write().insert(room_id.clone(), Vec::new());
        Ok(room_id)
    }

    async fn join_room(&self, room_id: &RoomId, user: User) -> Result<()> {
        let mut rooms = self.rooms.write();
        let users = rooms.get_mut(room_id).ok_or_else(|| room_not_found(room_id))?;
        users.push(user);
        Ok(())
    }

    async fn leave_room(&self, room_id: &RoomId, user: &User) -> Result<()> {
        let mut rooms = self.rooms.write();
        let users = rooms.get_mut(room_id).ok_or_else(|| room_not_found(room_id))?;

        let index = users
            .iter()
            .position(|u| u.id == user.id)
            .ok_or_else(|| Error::MemberNotFound(format!("{} is not in room {room_id}", user.name)))?;
        users.swap_remove(index);
        Ok(())
    }

    async fn get_room_users(&self, room_id: &RoomId) -> Result<Vec<User>> {
        self.rooms
            .read()
            .get(room_id)
            .cloned()
            .ok_or_else(|| room_not_found(room_id))
    }

    async fn get_rooms(&self) -> Result<Vec<Room>> {
        Ok(self
            .rooms
            .read()
            .iter()
            .map(|(id, users)| Room {
                id: id.clone(),
                users: users.clone(),
            })
            .collect())
    }
}
