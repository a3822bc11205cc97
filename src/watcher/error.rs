//! Error types for the watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("file system event error: {details}")]
    EventError { details: String },

    /// An index operation dispatched for one event failed. The watcher
    /// continues.
    #[error("dispatch failed for {path}: {reason}")]
    Dispatch { path: PathBuf, reason: String },

    #[error("event channel closed unexpectedly")]
    ChannelClosed,
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
