use parley_types::{Message, Notification};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::models::{NOTIFICATION_COLUMNS, NotificationRow, convert_all, now, ts};
use crate::{Database, Result};

/// Side effect of a message insert: one unread notification for the
/// receiver. Messages without a receiver notify nobody.
///
/// Only the create path calls this; edits never notify.
pub fn on_message_created(conn: &Connection, message: &Message) -> Result<Option<Notification>> {
    let Some(receiver_id) = message.receiver_id else {
        return Ok(None);
    };

    let notification = Notification {
        id: Uuid::new_v4(),
        user_id: receiver_id,
        message_id: message.id,
        created_at: now(),
        read: false,
    };

    conn.execute(
        "INSERT INTO notifications (id, user_id, message_id, created_at, read)
         VALUES (?1, ?2, ?3, ?4, 0)",
        (
            notification.id.to_string(),
            receiver_id.to_string(),
            message.id.to_string(),
            ts(&notification.created_at),
        ),
    )?;

    debug!("Notified {} of message {}", receiver_id, message.id);
    Ok(Some(notification))
}

impl Database {
    /// Notifications addressed to a user, in the order they were raised.
    pub fn notifications_for(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
                 ORDER BY rowid"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map((user_id.to_string(), unread_only), NotificationRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            convert_all(rows)
        })
    }

    /// Set a notification's read flag. Returns false for an unknown id.
    pub fn mark_notification_read(&self, id: Uuid, read: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET read = ?2 WHERE id = ?1",
                (id.to_string(), read),
            )?;
            Ok(updated > 0)
        })
    }
}
