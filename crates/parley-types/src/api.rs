use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Messages --

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    #[serde(default)]
    pub receiver_id: Option<Uuid>,
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessage {
    pub message_id: Uuid,
    pub body: String,
    /// Who performed the edit. Falls back to the message's sender.
    #[serde(default)]
    pub editor_id: Option<Uuid>,
}

// -- User deletion --

/// What happens to a message whose receiver is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReceiverDeletion {
    /// Remove the message along with its history and notifications.
    #[default]
    DeleteMessage,
    /// Keep the message and clear its receiver.
    NullReceiver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPolicy(pub String);

impl fmt::Display for UnknownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown receiver deletion policy '{}'", self.0)
    }
}

impl std::error::Error for UnknownPolicy {}

impl FromStr for ReceiverDeletion {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "delete-message" | "delete" => Ok(ReceiverDeletion::DeleteMessage),
            "null-receiver" | "null" => Ok(ReceiverDeletion::NullReceiver),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Counts of everything removed when a user was deleted.
/// All zero when the user did not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub messages_deleted: usize,
    pub history_deleted: usize,
    pub notifications_deleted: usize,
    pub memberships_removed: usize,
    /// Messages kept with their receiver cleared (`NullReceiver` only).
    pub receivers_cleared: usize,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        *self == CleanupReport::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        assert_eq!("delete-message".parse(), Ok(ReceiverDeletion::DeleteMessage));
        assert_eq!("NULL_RECEIVER".parse(), Ok(ReceiverDeletion::NullReceiver));
        assert!("keep".parse::<ReceiverDeletion>().is_err());
        assert_eq!(ReceiverDeletion::default(), ReceiverDeletion::DeleteMessage);
    }

    #[test]
    fn test_new_message_optional_fields() {
        let json = r#"{
            "conversation_id": "00000000-0000-0000-0000-000000000001",
            "sender_id": "00000000-0000-0000-0000-000000000002",
            "body": "hello"
        }"#;
        let msg: NewMessage = serde_json::from_str(json).unwrap();
        assert!(msg.receiver_id.is_none());
        assert!(msg.parent_id.is_none());
        assert_eq!(msg.body, "hello");
    }

    #[test]
    fn test_edit_message_rejects_unknown_fields() {
        let json = r#"{
            "message_id": "00000000-0000-0000-0000-000000000001",
            "body": "x",
            "read": true
        }"#;
        assert!(serde_json::from_str::<EditMessage>(json).is_err());
    }
}
