//! Mapping between core events and wire frames

use huddle_core::models::User;
use huddle_core::service::SdpOffer;
use huddle_core::sync::RoomEvent;
use huddle_proto::rooms::{self, room_method::Method, RoomMethod};

#[must_use]
pub fn proto_user(user: &User) -> rooms::User {
    rooms::User {
        id: user.id.to_string(),
        username: user.name.clone(),
    }
}

/// Frame pushed to a member for `event`
#[must_use]
pub fn event_to_frame(event: RoomEvent) -> RoomMethod {
    let method = match event {
        RoomEvent::RoomUsers(users) => Method::RoomUsers(rooms::RoomUsers {
            users: users.iter().map(proto_user).collect(),
        }),
        RoomEvent::MessageReceived { text, username } => {
            Method::MessageReceived(rooms::MessageReceived { text, username })
        }
        RoomEvent::SdpReceived { kind, sdp, to, from } => Method::SdpReceived(rooms::SdpReceived {
            r#type: kind,
            sdp,
            to,
            from,
        }),
    };
    RoomMethod::from(method)
}

#[must_use]
pub fn sdp_offers(entries: Vec<rooms::SdpEntry>) -> Vec<SdpOffer> {
    entries
        .into_iter()
        .map(|entry| SdpOffer {
            kind: entry.r#type,
            sdp: entry.sdp,
            to: entry.username,
        })
        .collect()
}
