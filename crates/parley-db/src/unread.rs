use parley_types::Message;
use uuid::Uuid;

use crate::queries::query_messages_where;
use crate::{Database, Result};

impl Database {
    /// Messages addressed to `user_id` that are still unread, oldest first.
    /// Served by the `(receiver_id, read, created_at)` index.
    pub fn unread_for(&self, user_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            query_messages_where(conn, "receiver_id = ?1 AND read = 0", &user_id.to_string())
        })
    }

    pub fn unread_count(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND read = 0",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    /// Returns false for an unknown id.
    pub fn mark_message_read(&self, message_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET read = 1 WHERE id = ?1",
                [message_id.to_string()],
            )?;
            Ok(updated > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::{NewMessage, ReceiverDeletion, Role};

    #[test]
    fn test_unread_filters_by_receiver_and_flag() {
        let db = Database::open_in_memory(ReceiverDeletion::default()).unwrap();
        let a = db.create_user("a", Role::Guest).unwrap().id;
        let b = db.create_user("b", Role::Guest).unwrap().id;
        let conv = db.create_conversation(&[a, b]).unwrap().id;

        let send = |from: Uuid, to: Option<Uuid>, body: &str| {
            db.create_message(NewMessage {
                conversation_id: conv,
                sender_id: from,
                receiver_id: to,
                body: body.to_string(),
                parent_id: None,
            })
            .unwrap()
            .0
        };

        let unread = send(a, Some(b), "Unread message");
        let read = send(a, Some(b), "Read message");
        send(b, Some(a), "for a");
        send(a, None, "broadcast");
        assert!(db.mark_message_read(read.id).unwrap());

        let messages = db.unread_for(b).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, unread.id);
        assert_eq!(messages[0].body, "Unread message");
        assert_eq!(db.unread_count(b).unwrap(), 1);
        assert_eq!(db.unread_count(a).unwrap(), 1);

        // listing does not consume
        assert_eq!(db.unread_for(b).unwrap().len(), 1);
    }

    #[test]
    fn test_unread_order_and_unknown_ids() {
        let db = Database::open_in_memory(ReceiverDeletion::default()).unwrap();
        let a = db.create_user("a", Role::Guest).unwrap().id;
        let b = db.create_user("b", Role::Guest).unwrap().id;
        let conv = db.create_conversation(&[a, b]).unwrap().id;

        for body in ["1", "2", "3"] {
            db.create_message(NewMessage {
                conversation_id: conv,
                sender_id: a,
                receiver_id: Some(b),
                body: body.to_string(),
                parent_id: None,
            })
            .unwrap();
        }

        let bodies: Vec<String> = db.unread_for(b).unwrap().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["1", "2", "3"]);

        assert!(db.unread_for(Uuid::new_v4()).unwrap().is_empty());
        assert!(!db.mark_message_read(Uuid::new_v4()).unwrap());
    }
}
