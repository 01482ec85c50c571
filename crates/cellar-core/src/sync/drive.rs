//! Cloud drive client
//!
//! Talks to a Drive v3 style REST API with a bearer token:
//!
//! - find: `GET /drive/v3/files?q=name = '<name>' and trashed = false`
//! - download: `GET /drive/v3/files/<id>?alt=media`
//! - create: `POST /upload/drive/v3/files?uploadType=multipart`
//! - update: `PATCH /upload/drive/v3/files/<id>?uploadType=media`

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::error::SyncError;
use super::remote::{Credential, RemoteFile, RemoteStore};

/// Default API root
pub const DEFAULT_API_URL: &str = "https://www.googleapis.com";

const JSON_MIME: &str = "application/json";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

/// HTTP client for the cloud drive
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: Client,
    api_url: String,
}

impl DriveClient {
    /// Create a client. `timeout` bounds each request.
    pub fn new(api_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, SyncError> {
        let mut builder = Client::builder().user_agent(concat!("cellar/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_url)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.api_url)
    }

    async fn send(request: RequestBuilder, credential: &Credential) -> Result<Response, SyncError> {
        let response = request.bearer_auth(credential.bearer()).send().await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::Unauthorized(status.as_u16())),
        _ => Err(SyncError::Remote {
            status: status.as_u16(),
            body,
        }),
    }
}

/// Query for a JSON file by exact name, excluding trashed files
fn name_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        escaped, JSON_MIME
    )
}

/// `multipart/related` body with a metadata part and a content part
fn multipart_body(boundary: &str, name: &str, content: &str) -> String {
    let metadata = json!({ "name": name, "mimeType": JSON_MIME });
    format!(
        "--{b}\r\nContent-Type: {m}; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {m}\r\n\r\n{content}\r\n--{b}--\r\n",
        b = boundary,
        m = JSON_MIME,
        meta = metadata,
        content = content,
    )
}

impl RemoteStore for DriveClient {
    async fn find_file(&self, credential: &Credential, name: &str) -> Result<Option<RemoteFile>, SyncError> {
        let request = self.http.get(self.files_url()).query(&[
            ("q", name_query(name)),
            ("fields", "files(id, name)".to_string()),
            ("spaces", "drive".to_string()),
        ]);
        let list: FileList = Self::send(request, credential).await?.json().await?;
        debug!("Drive lookup for {} matched {} file(s)", name, list.files.len());
        Ok(list.files.into_iter().next())
    }

    async fn download(&self, credential: &Credential, file: &RemoteFile) -> Result<String, SyncError> {
        let request = self
            .http
            .get(format!("{}/{}", self.files_url(), file.id))
            .query(&[("alt", "media")]);
        let body = Self::send(request, credential).await?.text().await?;
        debug!("Downloaded {} bytes from {}", body.len(), file.id);
        Ok(body)
    }

    async fn create(&self, credential: &Credential, name: &str, content: &str) -> Result<RemoteFile, SyncError> {
        let boundary = format!("cellar-{}", Uuid::new_v4().simple());
        let request = self
            .http
            .post(self.upload_url())
            .query(&[("uploadType", "multipart"), ("fields", "id,name")])
            .header(CONTENT_TYPE, format!("multipart/related; boundary={}", boundary))
            .body(multipart_body(&boundary, name, content));
        let file: RemoteFile = Self::send(request, credential).await?.json().await?;
        debug!("Created remote file {} ({})", file.name, file.id);
        Ok(file)
    }

    async fn update(&self, credential: &Credential, file: &RemoteFile, content: &str) -> Result<RemoteFile, SyncError> {
        let request = self
            .http
            .patch(format!("{}/{}", self.upload_url(), file.id))
            .query(&[("uploadType", "media"), ("fields", "id,name")])
            .header(CONTENT_TYPE, JSON_MIME)
            .body(content.to_string());
        let updated: RemoteFile = Self::send(request, credential).await?.json().await?;
        debug!("Updated remote file {}", updated.id);
        Ok(updated)
    }
}
