use crate::models::User;

/// Server-to-member push on a join-room connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// Membership after a join or leave
    RoomUsers(Vec<User>),

    MessageReceived {
        text: String,
        username: String,
    },

    /// SDP payload relayed from `from` to `to`; never interpreted here
    SdpReceived {
        kind: String,
        sdp: String,
        to: String,
        from: String,
    },
}

impl RoomEvent {
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::RoomUsers(_) => "room_users",
            Self::MessageReceived { .. } => "message_received",
            Self::SdpReceived { .. } => "sdp_received",
        }
    }
}
