//! Error types for shadow-capture.
//!
//! Each layer has its own error enum ([`ConfigError`], [`StorageError`],
//! [`PersistenceError`]); [`CaptureError`] wraps them for callers that want a
//! single type. None of these ever escape [`Tracker::initialize`]: capture
//! failures degrade to logged data loss.
//!
//! [`Tracker::initialize`]: crate::session::Tracker::initialize

use thiserror::Error;

use crate::config::ConfigError;
use crate::persistence::PersistenceError;
use crate::storage::StorageError;

/// Errors that can occur while setting up or persisting capture data.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Invalid options or tracker configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The persistence store rejected an operation.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The storage medium could not be opened or accessed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A specialized `Result` type for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;
