pub mod id;
pub mod room;
pub mod user;

pub use id::{generate_id, RoomId, UserId};
pub use room::Room;
pub use user::User;
