use std::path::PathBuf;

use parley_types::ReceiverDeletion;

use crate::Result;

pub const DB_PATH_VAR: &str = "PARLEY_DB_PATH";
pub const RECEIVER_DELETION_VAR: &str = "PARLEY_RECEIVER_DELETION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub path: PathBuf,
    pub receiver_deletion: ReceiverDeletion,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("parley.db"),
            receiver_deletion: ReceiverDeletion::default(),
        }
    }
}

impl DbConfig {
    /// Read `PARLEY_DB_PATH` and `PARLEY_RECEIVER_DELETION` from the process
    /// environment, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(DB_PATH_VAR).filter(|v| !v.is_empty()) {
            config.path = PathBuf::from(path);
        }
        if let Some(policy) = lookup(RECEIVER_DELETION_VAR).filter(|v| !v.is_empty()) {
            config.receiver_deletion = policy.parse()?;
        }

        Ok(config)
    }
}
