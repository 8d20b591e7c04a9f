//! Room Store
//!
//! The repository is the source of truth for which rooms exist and who is in
//! them. It does not enforce name uniqueness; callers check that under the
//! room lock before writing.

pub mod memory;

use async_trait::async_trait;

use crate::models::{Room, RoomId, User};
use crate::Result;

pub use memory::MemoryRoomRepository;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Insert an empty room under a freshly generated id.
    async fn create_room(&self) -> Result<RoomId>;

    /// Add `user` to the room. `NotFound` if the room does not exist.
    async fn join_room(&self, room_id: &RoomId, user: User) -> Result<()>;

    /// Remove one member matching `user.id`.
    ///
    /// `NotFound` for a missing room, `MemberNotFound` if the user is not in it.
    async fn leave_room(&self, room_id: &RoomId, user: &User) -> Result<()>;

    /// Current members, in no particular order.
    async fn get_room_users(&self, room_id: &RoomId) -> Result<Vec<User>>;

    async fn get_rooms(&self) -> Result<Vec<Room>>;
}
