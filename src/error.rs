//! Error types for vertigo

use crate::types::ParseMode;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for vertigo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving VBoxManage or parsing its output
#[derive(Error, Debug)]
pub enum Error {
    #[error("No VM found for name '{name}' and UUID '{uuid}'")]
    UnknownVm { name: String, uuid: String },

    #[error("Unknown option '{option}' for command '{command}'")]
    UnknownOption { command: String, option: String },

    #[error("Malformed {mode} line: {line:?}")]
    MalformedRecordLine { line: String, mode: ParseMode },

    #[error("VM info is missing the '{field}' field")]
    MissingIdentityField { field: &'static str },

    #[error("Malformed VM list line: {line:?}")]
    MalformedListLine { line: String },

    #[error("Failed to register VM from {}: {stderr}", .path.display())]
    Registration { path: PathBuf, stderr: String },

    #[error("Command failed: {command}\nstderr: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
