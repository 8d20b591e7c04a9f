//! Huddle protocol definitions
//!
//! Generated code for `proto/rooms.proto`: the wire messages of the rooms API
//! and the tonic client/server for `huddle.rooms.RoomsService`.

pub mod rooms {
    #[allow(clippy::all)]
    #[allow(warnings)]
    include!(concat!(env!("OUT_DIR"), "/huddle.rooms.rs"));
}

pub use rooms::rooms_service_client::RoomsServiceClient;
pub use rooms::rooms_service_server::{RoomsService, RoomsServiceServer};

impl From<rooms::room_method::Method> for rooms::RoomMethod {
    fn from(method: rooms::room_method::Method) -> Self {
        Self {
            method: Some(method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::rooms::{room_method, RoomMethod, SdpEntry, SendMessage};
    use prost::Message;

    #[test]
    fn test_room_method_json_shape() {
        let frame = RoomMethod::from(room_method::Method::SendMessage(SendMessage {
            text: "hi".to_string(),
        }));
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"method":{"send_message":{"text":"hi"}}}"#);
    }

    #[test]
    fn test_sdp_entry_type_field_name() {
        let entry: SdpEntry =
            serde_json::from_str(r#"{"type":"offer","sdp":"v=0","username":"bob"}"#).unwrap();
        assert_eq!(entry.r#type, "offer");
        assert_eq!(entry.username, "bob");
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let entry: SdpEntry = serde_json::from_str(r#"{"username":"bob"}"#).unwrap();
        assert!(entry.r#type.is_empty());
        assert!(entry.sdp.is_empty());
    }

    #[test]
    fn test_empty_frame_has_no_method() {
        let frame: RoomMethod = serde_json::from_str("{}").unwrap();
        assert!(frame.method.is_none());

        let decoded = RoomMethod::decode(&[][..]).unwrap();
        assert!(decoded.method.is_none());
    }
}
