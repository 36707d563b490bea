pub mod api;
pub mod models;

pub use api::{CleanupReport, EditMessage, NewMessage, ReceiverDeletion};
pub use models::{
    Conversation, Message, MessageHistory, Notification, Role, Thread, ThreadEntry, User,
};
