pub mod notifier;
pub mod room;

pub use notifier::{RoomListener, RoomNotifier};
pub use room::{Admission, Membership, RoomService, SdpOffer};
