//! Database row types — these map directly to SQLite rows.
//! Ids and timestamps stay as TEXT here; conversion into the parley-types
//! models happens in one place so a corrupt value surfaces as `Error::Corrupt`.
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parley_types::{Message, MessageHistory, Notification, User};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

pub(crate) const USER_COLUMNS: &str = "id, username, role, created_at";

pub(crate) const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, receiver_id, parent_id, \
     body, created_at, is_edited, edited_at, edited_by, read";

pub(crate) const HISTORY_COLUMNS: &str = "id, message_id, old_content, edited_at, edited_by";

pub(crate) const NOTIFICATION_COLUMNS: &str = "id, user_id, message_id, created_at, read";

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub role: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: Option<String>,
    pub parent_id: Option<String>,
    pub body: String,
    pub created_at: String,
    pub is_edited: bool,
    pub edited_at: Option<String>,
    pub edited_by: Option<String>,
    pub read: bool,
}

pub struct HistoryRow {
    pub id: String,
    pub message_id: String,
    pub old_content: String,
    pub edited_at: String,
    pub edited_by: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub message_id: String,
    pub created_at: String,
    pub read: bool,
}

impl UserRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            role: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl MessageRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender_id: row.get(2)?,
            receiver_id: row.get(3)?,
            parent_id: row.get(4)?,
            body: row.get(5)?,
            created_at: row.get(6)?,
            is_edited: row.get(7)?,
            edited_at: row.get(8)?,
            edited_by: row.get(9)?,
            read: row.get(10)?,
        })
    }
}

impl HistoryRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            message_id: row.get(1)?,
            old_content: row.get(2)?,
            edited_at: row.get(3)?,
            edited_by: row.get(4)?,
        })
    }
}

impl NotificationRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            message_id: row.get(2)?,
            created_at: row.get(3)?,
            read: row.get(4)?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_id("users.id", &row.id)?,
            role: row.role.parse().map_err(|_| Error::Corrupt {
                column: "users.role",
                value: row.role.clone(),
            })?,
            username: row.username,
            created_at: parse_ts("users.created_at", &row.created_at)?,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Message {
            id: parse_id("messages.id", &row.id)?,
            conversation_id: parse_id("messages.conversation_id", &row.conversation_id)?,
            sender_id: parse_id("messages.sender_id", &row.sender_id)?,
            receiver_id: parse_opt_id("messages.receiver_id", row.receiver_id.as_deref())?,
            parent_id: parse_opt_id("messages.parent_id", row.parent_id.as_deref())?,
            body: row.body,
            created_at: parse_ts("messages.created_at", &row.created_at)?,
            is_edited: row.is_edited,
            edited_at: row
                .edited_at
                .as_deref()
                .map(|v| parse_ts("messages.edited_at", v))
                .transpose()?,
            edited_by: parse_opt_id("messages.edited_by", row.edited_by.as_deref())?,
            read: row.read,
        })
    }
}

impl TryFrom<HistoryRow> for MessageHistory {
    type Error = Error;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(MessageHistory {
            id: parse_id("message_history.id", &row.id)?,
            message_id: parse_id("message_history.message_id", &row.message_id)?,
            old_content: row.old_content,
            edited_at: parse_ts("message_history.edited_at", &row.edited_at)?,
            edited_by: parse_id("message_history.edited_by", &row.edited_by)?,
        })
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = Error;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            id: parse_id("notifications.id", &row.id)?,
            user_id: parse_id("notifications.user_id", &row.user_id)?,
            message_id: parse_id("notifications.message_id", &row.message_id)?,
            created_at: parse_ts("notifications.created_at", &row.created_at)?,
            read: row.read,
        })
    }
}

/// Collect mapped rows and convert each into its model type.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Current time at the precision we store (microseconds), so a value written
/// and read back compares equal.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339: lexical order of the TEXT column is chronological.
pub(crate) fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(column: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| Error::Corrupt {
            column,
            value: value.to_string(),
        })
}

pub(crate) fn parse_id(column: &'static str, value: &str) -> Result<Uuid> {
    value.parse().map_err(|_| Error::Corrupt {
        column,
        value: value.to_string(),
    })
}

fn parse_opt_id(column: &'static str, value: Option<&str>) -> Result<Option<Uuid>> {
    value.map(|v| parse_id(column, v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_text_roundtrip_and_order() {
        let a = now();
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(parse_ts("t", &ts(&a)).unwrap(), a);
        assert!(ts(&a) < ts(&b));
    }

    #[test]
    fn test_corrupt_values_are_reported() {
        let err = parse_id("messages.id", "not-a-uuid").unwrap_err();
        assert!(matches!(err, Error::Corrupt { column: "messages.id", .. }));

        let err = parse_ts("messages.created_at", "2024-13-40").unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }
}
