use parley_types::{CleanupReport, ReceiverDeletion};
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::queries::user_exists;
use crate::{Database, Result};

/// Remove a user and everything that depends on them.
///
/// Runs on the caller's transaction; the caller commits or rolls back the
/// whole set. Messages the user sent are always removed. Messages the user
/// received are removed or kept with a cleared receiver depending on
/// `policy`. History and notifications of removed messages go with them.
/// An unknown user yields an empty report.
pub fn cleanup_for_user(
    conn: &Connection,
    user_id: Uuid,
    policy: ReceiverDeletion,
) -> Result<CleanupReport> {
    if !user_exists(conn, user_id)? {
        debug!("Cleanup for unknown user {} skipped", user_id);
        return Ok(CleanupReport::default());
    }

    let uid = user_id.to_string();
    let doomed = match policy {
        ReceiverDeletion::DeleteMessage => {
            "SELECT id FROM messages WHERE sender_id = ?1 OR receiver_id = ?1"
        }
        ReceiverDeletion::NullReceiver => "SELECT id FROM messages WHERE sender_id = ?1",
    };

    let mut report = CleanupReport {
        history_deleted: conn.execute(
            &format!(
                "DELETE FROM message_history WHERE edited_by = ?1 OR message_id IN ({doomed})"
            ),
            [&uid],
        )?,
        notifications_deleted: conn.execute(
            &format!("DELETE FROM notifications WHERE user_id = ?1 OR message_id IN ({doomed})"),
            [&uid],
        )?,
        ..CleanupReport::default()
    };

    // Surviving replies lose their parent instead of pointing at nothing.
    conn.execute(
        &format!(
            "UPDATE messages SET parent_id = NULL
             WHERE parent_id IN ({doomed}) AND id NOT IN ({doomed})"
        ),
        [&uid],
    )?;

    report.messages_deleted = conn.execute(
        &format!("DELETE FROM messages WHERE id IN ({doomed})"),
        [&uid],
    )?;

    if policy == ReceiverDeletion::NullReceiver {
        report.receivers_cleared = conn.execute(
            "UPDATE messages SET receiver_id = NULL WHERE receiver_id = ?1",
            [&uid],
        )?;
    }

    // Edit flag stays; only the reference to the departed editor goes.
    conn.execute("UPDATE messages SET edited_by = NULL WHERE edited_by = ?1", [&uid])?;

    report.memberships_removed = conn.execute(
        "DELETE FROM conversation_participants WHERE user_id = ?1",
        [&uid],
    )?;

    conn.execute("DELETE FROM users WHERE id = ?1", [&uid])?;

    Ok(report)
}

impl Database {
    /// Delete a user together with their messages, history, notifications
    /// and memberships, as one transaction. Deleting an unknown or already
    /// deleted user is a no-op returning an empty report.
    pub fn delete_user(&self, user_id: Uuid) -> Result<CleanupReport> {
        let policy = self.receiver_deletion();
        let report = self.with_tx(|tx| cleanup_for_user(tx, user_id, policy))?;

        if !report.is_empty() {
            info!(
                "Deleted user {}: {} messages, {} history entries, {} notifications, \
                 {} memberships, {} receivers cleared",
                user_id,
                report.messages_deleted,
                report.history_deleted,
                report.notifications_deleted,
                report.memberships_removed,
                report.receivers_cleared,
            );
        }
        Ok(report)
    }
}
