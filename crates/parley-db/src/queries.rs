use std::collections::HashMap;

use parley_types::{
    Conversation, Message, NewMessage, Notification, Role, Thread, ThreadEntry, User,
};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    MESSAGE_COLUMNS, MessageRow, USER_COLUMNS, UserRow, convert_all, now, parse_id, parse_ts, ts,
};
use crate::notifications;
use crate::{Database, Error, Result};

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, role: Role) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            role,
            created_at: now(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, role, created_at) VALUES (?1, ?2, ?3, ?4)",
                (user.id.to_string(), &user.username, role.as_str(), ts(&user.created_at)),
            )?;
            Ok(())
        })?;

        debug!("Created user {} ({})", user.username, user.id);
        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    // -- Conversations --

    pub fn create_conversation(&self, participants: &[Uuid]) -> Result<Conversation> {
        let id = Uuid::new_v4();
        let created_at = now();

        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO conversations (id, created_at) VALUES (?1, ?2)",
                (id.to_string(), ts(&created_at)),
            )?;
            for user_id in participants {
                ensure_user(tx, *user_id)?;
                insert_participant(tx, id, *user_id)?;
            }
            Ok(())
        })?;

        let mut participants = participants.to_vec();
        participants.sort();
        participants.dedup();

        Ok(Conversation {
            id,
            participants,
            created_at,
        })
    }

    /// Returns false when the user already takes part.
    pub fn add_participant(&self, conversation_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_tx(|tx| {
            ensure_conversation(tx, conversation_id)?;
            ensure_user(tx, user_id)?;
            insert_participant(tx, conversation_id, user_id)
        })
    }

    /// Detach a user from a conversation. The conversation itself stays,
    /// even when nobody is left in it.
    pub fn remove_participant(&self, conversation_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
                (conversation_id.to_string(), user_id.to_string()),
            )?;
            Ok(removed > 0)
        })
    }

    pub fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.with_conn(|conn| query_conversation(conn, id))
    }

    pub fn participants(&self, conversation_id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| query_participants(conn, conversation_id))
    }

    pub fn conversations_for(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id FROM conversations c
                 JOIN conversation_participants p ON p.conversation_id = c.id
                 WHERE p.user_id = ?1
                 ORDER BY c.rowid",
            )?;
            let ids = stmt
                .query_map([user_id.to_string()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut conversations = Vec::with_capacity(ids.len());
            for id in ids {
                let id = parse_id("conversations.id", &id)?;
                if let Some(c) = query_conversation(conn, id)? {
                    conversations.push(c);
                }
            }
            Ok(conversations)
        })
    }

    // -- Messages --

    /// Insert a message and, in the same transaction, notify its receiver.
    pub fn create_message(&self, req: NewMessage) -> Result<(Message, Option<Notification>)> {
        self.with_tx(|tx| {
            ensure_conversation(tx, req.conversation_id)?;
            ensure_user(tx, req.sender_id)?;
            if let Some(receiver_id) = req.receiver_id {
                ensure_user(tx, receiver_id)?;
            }
            if let Some(parent_id) = req.parent_id {
                let parent =
                    query_message(tx, parent_id)?.ok_or(Error::MessageNotFound(parent_id))?;
                if parent.conversation_id != req.conversation_id {
                    return Err(Error::ParentConversationMismatch {
                        parent: parent_id,
                        conversation: req.conversation_id,
                    });
                }
            }

            let message = Message {
                id: Uuid::new_v4(),
                conversation_id: req.conversation_id,
                sender_id: req.sender_id,
                receiver_id: req.receiver_id,
                parent_id: req.parent_id,
                body: req.body,
                created_at: now(),
                is_edited: false,
                edited_at: None,
                edited_by: None,
                read: false,
            };
            insert_message(tx, &message)?;

            let notification = notifications::on_message_created(tx, &message)?;

            debug!(
                "Message {} created in conversation {}",
                message.id, message.conversation_id
            );
            Ok((message, notification))
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// All messages of a conversation, oldest first.
    pub fn conversation_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            query_messages_where(
                conn,
                "conversation_id = ?1",
                &conversation_id.to_string(),
            )
        })
    }

    /// Direct replies to a message, oldest first.
    pub fn replies(&self, message_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| query_messages_where(conn, "parent_id = ?1", &message_id.to_string()))
    }

    /// The message and every reply below it, depth-first.
    pub fn thread(&self, message_id: Uuid) -> Result<Option<Thread>> {
        let messages = self.with_conn(|conn| {
            let sql = format!(
                "WITH RECURSIVE thread(id) AS (
                     SELECT id FROM messages WHERE id = ?1
                     UNION ALL
                     SELECT m.id FROM messages m JOIN thread t ON m.parent_id = t.id
                 )
                 SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE id IN (SELECT id FROM thread)
                 ORDER BY rowid"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([message_id.to_string()], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            convert_all::<_, Message>(rows)
        })?;

        let mut root = None;
        let mut children: HashMap<Uuid, Vec<Message>> = HashMap::new();
        for message in messages {
            if message.id == message_id {
                root = Some(message);
            } else if let Some(parent_id) = message.parent_id {
                children.entry(parent_id).or_default().push(message);
            }
        }

        Ok(root.map(|m| flatten_thread(m, children)))
    }
}

/// Depth-first walk with an explicit stack; replies are pushed in reverse
/// so siblings come out in creation order.
fn flatten_thread(root: Message, mut children: HashMap<Uuid, Vec<Message>>) -> Thread {
    let mut entries = Vec::new();
    let mut stack = vec![(0, root)];

    while let Some((depth, message)) = stack.pop() {
        if let Some(replies) = children.remove(&message.id) {
            stack.extend(replies.into_iter().rev().map(|reply| (depth + 1, reply)));
        }
        entries.push(ThreadEntry { depth, message });
    }

    Thread { entries }
}

pub(crate) fn query_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id.to_string()], UserRow::from_row)
        .optional()?;
    row.map(User::try_from).transpose()
}

pub(crate) fn user_exists(conn: &Connection, id: Uuid) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id.to_string()], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn ensure_user(conn: &Connection, id: Uuid) -> Result<()> {
    if user_exists(conn, id)? {
        Ok(())
    } else {
        Err(Error::UserNotFound(id))
    }
}

fn ensure_conversation(conn: &Connection, id: Uuid) -> Result<()> {
    let found = conn
        .query_row(
            "SELECT 1 FROM conversations WHERE id = ?1",
            [id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    found.ok_or(Error::ConversationNotFound(id))
}

fn insert_participant(conn: &Connection, conversation_id: Uuid, user_id: Uuid) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO conversation_participants (conversation_id, user_id, joined_at)
         VALUES (?1, ?2, ?3)",
        (conversation_id.to_string(), user_id.to_string(), ts(&now())),
    )?;
    Ok(inserted > 0)
}

fn query_conversation(conn: &Connection, id: Uuid) -> Result<Option<Conversation>> {
    let created_at: Option<String> = conn
        .query_row(
            "SELECT created_at FROM conversations WHERE id = ?1",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    let Some(created_at) = created_at else {
        return Ok(None);
    };

    Ok(Some(Conversation {
        id,
        participants: query_participants(conn, id)?,
        created_at: parse_ts("conversations.created_at", &created_at)?,
    }))
}

fn query_participants(conn: &Connection, conversation_id: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM conversation_participants WHERE conversation_id = ?1 ORDER BY user_id",
    )?;
    let ids = stmt
        .query_map([conversation_id.to_string()], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    ids.iter()
        .map(|id| parse_id("conversation_participants.user_id", id))
        .collect()
}

pub(crate) fn query_message(conn: &Connection, id: Uuid) -> Result<Option<Message>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id.to_string()], MessageRow::from_row)
        .optional()?;
    row.map(Message::try_from).transpose()
}

/// Messages matching a single-parameter filter, in insertion order.
/// Writes are serialized, so rowid order is creation order even when the
/// wall clock steps backwards.
pub(crate) fn query_messages_where(
    conn: &Connection,
    filter: &str,
    param: &str,
) -> Result<Vec<Message>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE {filter} ORDER BY rowid");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([param], MessageRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    convert_all(rows)
}

fn insert_message(conn: &Connection, message: &Message) -> Result<()> {
    conn.execute(
        "INSERT INTO messages
             (id, conversation_id, sender_id, receiver_id, parent_id, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            message.id.to_string(),
            message.conversation_id.to_string(),
            message.sender_id.to_string(),
            message.receiver_id.map(|id| id.to_string()),
            message.parent_id.map(|id| id.to_string()),
            message.body,
            ts(&message.created_at),
        ],
    )?;
    Ok(())
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
