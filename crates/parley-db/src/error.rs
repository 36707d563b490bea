use parley_types::api::UnknownPolicy;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    /// Anything the SQLite layer reports: constraint violations, I/O, locking.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("corrupt {column} value '{value}'")]
    Corrupt { column: &'static str, value: String },

    #[error("user not found: {0}")]
    UserNotFound(Uuid),

    #[error("conversation not found: {0}")]
    ConversationNotFound(Uuid),

    #[error("message not found: {0}")]
    MessageNotFound(Uuid),

    #[error("parent message {parent} is not part of conversation {conversation}")]
    ParentConversationMismatch { parent: Uuid, conversation: Uuid },

    #[error(transparent)]
    InvalidPolicy(#[from] UnknownPolicy),
}

pub type Result<T> = std::result::Result<T, Error>;
