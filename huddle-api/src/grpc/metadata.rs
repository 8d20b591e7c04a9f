//! Join identity carried in request metadata

use tonic::metadata::MetadataMap;

use crate::impls::signaling::JoinRequest;

pub const USERNAME_KEY: &str = "username";
pub const ROOM_ID_KEY: &str = "room-id";
const ROOM_ID_ALT_KEY: &str = "room_id";

fn value(metadata: &MetadataMap, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// Read `username` and `room-id` (or `room_id`) from the metadata.
///
/// Header names are case-insensitive on the wire, so `Username` and
/// `Room-Id` from a gateway land here too. Presence is checked later by the
/// session so every transport reports the same errors.
#[must_use]
pub fn join_request(metadata: &MetadataMap) -> JoinRequest {
    JoinRequest {
        username: value(metadata, USERNAME_KEY),
        room_id: value(metadata, ROOM_ID_KEY).or_else(|| value(metadata, ROOM_ID_ALT_KEY)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_both_fields() {
        let mut metadata = MetadataMap::new();
        metadata.insert("username", "alice".parse().unwrap());
        metadata.insert("room-id", "r1".parse().unwrap());

        let request = join_request(&metadata);
        assert_eq!(request.username.as_deref(), Some("alice"));
        assert_eq!(request.room_id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_underscore_room_key() {
        let mut metadata = MetadataMap::new();
        metadata.insert("room_id", "r2".parse().unwrap());

        let request = join_request(&metadata);
        assert_eq!(request.username, None);
        assert_eq!(request.room_id.as_deref(), Some("r2"));
    }

    #[test]
    fn test_header_map_is_case_insensitive() {
        let mut headers = tonic::codegen::http::HeaderMap::new();
        headers.insert("Username", "bob".parse().unwrap());
        headers.insert("Room-Id", "r3".parse().unwrap());

        let request = join_request(&MetadataMap::from_headers(headers));
        assert_eq!(request.username.as_deref(), Some("bob"));
        assert_eq!(request.room_id.as_deref(), Some("r3"));
    }
}
