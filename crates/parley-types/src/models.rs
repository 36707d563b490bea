use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Host,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Host => "host",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role string is not one of `guest`, `host` or `admin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "host" => Ok(Role::Host),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A message inside a conversation.
///
/// `edited_by` is only ever set once `is_edited` is true; it can become
/// `None` again later if the editor's account is removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub edited_by: Option<Uuid>,
    pub read: bool,
}

/// Snapshot of a message body as it was right before one edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHistory {
    pub id: Uuid,
    pub message_id: Uuid,
    pub old_content: String,
    pub edited_at: DateTime<Utc>,
    pub edited_by: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// One message of a thread and its distance from the thread root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadEntry {
    pub depth: usize,
    pub message: Message,
}

/// A message and every reply below it, flattened depth-first: each message
/// is followed by its whole reply subtree, siblings in creation order.
///
/// Kept flat because reply chains can be arbitrarily deep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub entries: Vec<ThreadEntry>,
}

impl Thread {
    pub fn root(&self) -> Option<&Message> {
        self.entries.first().map(|e| &e.message)
    }

    /// Total number of messages in the thread, root included.
    pub fn message_count(&self) -> usize {
        self.entries.len()
    }

    /// Deepest reply level; 0 when the root has no replies.
    pub fn depth(&self) -> usize {
        self.entries.iter().map(|e| e.depth).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("guest".parse::<Role>(), Ok(Role::Guest));
        assert_eq!(" Admin ".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("HOST".parse::<Role>(), Ok(Role::Host));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_thread_accessors() {
        let message = |body: &str| Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::nil(),
            sender_id: Uuid::nil(),
            receiver_id: None,
            parent_id: None,
            body: body.to_string(),
            created_at: Utc::now(),
            is_edited: false,
            edited_at: None,
            edited_by: None,
            read: false,
        };
        let thread = Thread {
            entries: vec![
                ThreadEntry { depth: 0, message: message("root") },
                ThreadEntry { depth: 1, message: message("reply") },
                ThreadEntry { depth: 2, message: message("nested") },
                ThreadEntry { depth: 1, message: message("second reply") },
            ],
        };
        assert_eq!(thread.root().map(|m| m.body.as_str()), Some("root"));
        assert_eq!(thread.message_count(), 4);
        assert_eq!(thread.depth(), 2);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Host).unwrap();
        assert_eq!(json, "\"host\"");
        assert_eq!(Role::Host.to_string(), "host");
    }
}
