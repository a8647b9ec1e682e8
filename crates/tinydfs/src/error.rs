// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::path::DfsPath;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the naming server, the storage servers and the transport.
///
/// The type is serializable because storage and registration failures travel
/// back to the caller through the remote-call protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    #[error("Path not found: {0}")]
    NotFound(DfsPath),

    #[error("Not a directory: {0}")]
    NotADirectory(DfsPath),

    #[error("Not a file: {0}")]
    NotAFile(DfsPath),

    #[error("Entry already exists: {0}")]
    AlreadyExists(DfsPath),

    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Interrupted while waiting for a lock on {0}")]
    LockInterrupted(DfsPath),

    #[error("No {mode} lock held on {path}")]
    NotLocked { path: DfsPath, mode: String },

    #[error("Storage server already registered: {0}")]
    AlreadyRegistered(String),

    #[error("No storage servers registered")]
    NoStorage,

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Range {offset}+{length} out of bounds for {path} of size {size}")]
    OutOfBounds {
        path: DfsPath,
        offset: u64,
        length: u64,
        size: u64,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn not_found(path: &DfsPath) -> Self {
        Error::NotFound(path.clone())
    }

    pub fn not_a_directory(path: &DfsPath) -> Self {
        Error::NotADirectory(path.clone())
    }

    pub fn not_a_file(path: &DfsPath) -> Self {
        Error::NotAFile(path.clone())
    }

    pub fn already_exists(path: &DfsPath) -> Self {
        Error::AlreadyExists(path.clone())
    }

    pub fn communication<S: Into<String>>(message: S) -> Self {
        Error::Communication(message.into())
    }

    pub fn lock_interrupted(path: &DfsPath) -> Self {
        Error::LockInterrupted(path.clone())
    }

    pub fn not_locked(path: &DfsPath, mode: crate::lock::LockMode) -> Self {
        Error::NotLocked {
            path: path.clone(),
            mode: mode.to_string(),
        }
    }

    pub fn invalid_path<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }

    /// True for failures of the remote call itself rather than of the callee
    #[must_use]
    pub fn is_communication(&self) -> bool {
        matches!(self, Error::Communication(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Communication(format!("codec: {}", err))
    }
}

impl From<serde_yaml_ng::Error> for Error {
    fn from(err: serde_yaml_ng::Error) -> Error {
        Error::Config(err.to_string())
    }
}
