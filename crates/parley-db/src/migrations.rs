use rusqlite::Connection;
use tracing::info;

use crate::Result;

/// Ordered schema steps. Entry `n` brings the schema to version `n + 1`.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "initial schema",
        "
        CREATE TABLE users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            role        TEXT NOT NULL DEFAULT 'guest'
                        CHECK (role IN ('guest', 'host', 'admin')),
            created_at  TEXT NOT NULL
        );

        CREATE TABLE conversations (
            id          TEXT PRIMARY KEY,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE conversation_participants (
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            user_id         TEXT NOT NULL REFERENCES users(id),
            joined_at       TEXT NOT NULL,
            PRIMARY KEY (conversation_id, user_id)
        );

        CREATE INDEX idx_participants_user
            ON conversation_participants(user_id);

        CREATE TABLE messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            sender_id       TEXT NOT NULL REFERENCES users(id),
            receiver_id     TEXT REFERENCES users(id),
            parent_id       TEXT REFERENCES messages(id) ON DELETE SET NULL,
            body            TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            is_edited       INTEGER NOT NULL DEFAULT 0,
            edited_at       TEXT,
            edited_by       TEXT REFERENCES users(id),
            read            INTEGER NOT NULL DEFAULT 0,
            CHECK (edited_by IS NULL OR is_edited = 1)
        );

        CREATE INDEX idx_messages_conversation
            ON messages(conversation_id);
        CREATE INDEX idx_messages_unread
            ON messages(receiver_id, read);
        CREATE INDEX idx_messages_sender
            ON messages(sender_id);
        CREATE INDEX idx_messages_parent
            ON messages(parent_id);

        CREATE TABLE message_history (
            id          TEXT PRIMARY KEY,
            message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            old_content TEXT NOT NULL,
            edited_at   TEXT NOT NULL,
            edited_by   TEXT NOT NULL REFERENCES users(id)
        );

        CREATE INDEX idx_history_message
            ON message_history(message_id);
        CREATE INDEX idx_history_editor
            ON message_history(edited_by);

        CREATE TABLE notifications (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            read        INTEGER NOT NULL DEFAULT 0,
            UNIQUE(user_id, message_id)
        );

        CREATE INDEX idx_notifications_user
            ON notifications(user_id, read);
        CREATE INDEX idx_notifications_message
            ON notifications(message_id);
        ",
    ),
];

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    for (idx, (name, sql)) in MIGRATIONS.iter().enumerate().skip(version) {
        let target = idx + 1;
        info!("Running migration v{} ({})", target, name);

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [target as i64])?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version.max(0) as usize)
}

pub fn latest_version() -> usize {
    MIGRATIONS.len()
}
