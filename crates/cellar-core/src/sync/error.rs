//! Sync error types

use thiserror::Error;

use crate::backup::ImportError;
use crate::storage::StorageError;

/// Errors from pulling or pushing the remote copy
#[derive(Error, Debug)]
pub enum SyncError {
    /// No credential has been supplied yet
    #[error("Not signed in to cloud sync")]
    NotAuthenticated,

    /// The drive rejected the credential
    #[error("Cloud drive rejected the credential (HTTP {0}). Sign in again.")]
    Unauthorized(u16),

    /// Any other non-success response
    #[error("Cloud drive returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote document could not be applied locally
    #[error("Remote data could not be imported: {0}")]
    Import(#[from] ImportError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to serialize local data: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether signing in again could fix this
    pub fn needs_sign_in(&self) -> bool {
        matches!(self, SyncError::NotAuthenticated | SyncError::Unauthorized(_))
    }
}
