use std::path::PathBuf;

use crate::storage::EntryId;

#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Entry not found: {0:?}")]
    EntryNotFound(EntryId),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Entry already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Watcher error: {0}")]
    Watcher(String),
}

pub type Result<T> = std::result::Result<T, VfsError>;
