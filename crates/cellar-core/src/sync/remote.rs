//! Remote single-file store abstraction

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use super::error::SyncError;

/// Opaque bearer token for the cloud drive
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn bearer(&self) -> &str {
        &self.0
    }
}

// Keep tokens out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// A file in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A remote store holding whole files by name
pub trait RemoteStore: Send + Sync + 'static {
    /// Look up a non-trashed file by exact name
    fn find_file(
        &self,
        credential: &Credential,
        name: &str,
    ) -> impl Future<Output = Result<Option<RemoteFile>, SyncError>> + Send;

    /// Fetch the full content of a file
    fn download(
        &self,
        credential: &Credential,
        file: &RemoteFile,
    ) -> impl Future<Output = Result<String, SyncError>> + Send;

    /// Create a new file
    fn create(
        &self,
        credential: &Credential,
        name: &str,
        content: &str,
    ) -> impl Future<Output = Result<RemoteFile, SyncError>> + Send;

    /// Replace the content of an existing file
    fn update(
        &self,
        credential: &Credential,
        file: &RemoteFile,
        content: &str,
    ) -> impl Future<Output = Result<RemoteFile, SyncError>> + Send;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_hides_token() {
        let credential = Credential::new("ya29.secret");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.bearer(), "ya29.secret");
    }

    #[test]
    fn test_remote_file_from_listing() {
        let file: RemoteFile = serde_json::from_str(r#"{"id": "abc", "name": "db.json"}"#).unwrap();
        assert_eq!(file.id, "abc");
        let bare: RemoteFile = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert!(bare.name.is_empty());
    }
}
