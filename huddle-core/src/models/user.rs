use serde::{Deserialize, Serialize};

use super::id::UserId;

/// A connected room member.
///
/// Identity is the id. Names are only unique within a single room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_distinct_users() {
        let a = User::new("alice");
        let b = User::new("alice");

        assert_eq!(a.name, b.name);
        assert_ne!(a.id, b.id);
        assert_ne!(a, b);
    }
}
