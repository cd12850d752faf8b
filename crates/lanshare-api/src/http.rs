//! reqwest-backed implementation of [`Backend`].

use crate::model::{
    DownloadRequest, ErrorBody, IdentityBody, SetIdentityRequest, ShareRequest, ShareResponse,
};
use crate::{ApiError, Backend, FileEntry, FileId, Peer};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use std::time::Duration;

/// Client for the backend's HTTP API rooted at `base_url`
/// (e.g. `http://localhost:19001/api`).
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Transport(format!("invalid API URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Transport(format!(
                "API URL cannot carry a path: {}",
                base_url
            )));
        }

        // No overall timeout: a download lasts as long as the transfer does.
        let client = Client::builder().connect_timeout(connect_timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL. Each segment is
    /// percent-encoded, so peer addresses can be passed as-is.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("API URL cannot carry a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Turn a non-success response into [`ApiError::Request`], preferring the
/// backend's `{"error": ...}` message.
async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| status_message(status));

    tracing::debug!("Backend returned {}: {}", status, message);
    Err(ApiError::request(status.as_u16(), message))
}

fn status_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} (status {})", reason, status.as_u16()),
        None => format!("HTTP error (status {})", status.as_u16()),
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn get_identity(&self) -> Result<Option<String>, ApiError> {
        let url = self.endpoint(&["identity"])?;
        let response = check(self.client.get(url).send().await?).await?;
        let body: IdentityBody = response.json().await?;
        Ok(body.username)
    }

    async fn set_identity(&self, username: &str) -> Result<String, ApiError> {
        let url = self.endpoint(&["identity"])?;
        let response = self
            .client
            .post(url)
            .json(&SetIdentityRequest { username })
            .send()
            .await?;
        let body: IdentityBody = check(response).await?.json().await?;

        // Older backends only echo a message; fall back to what we sent.
        Ok(body.username.unwrap_or_else(|| username.to_string()))
    }

    async fn list_peers(&self) -> Result<Vec<Peer>, ApiError> {
        let url = self.endpoint(&["peers"])?;
        let response = check(self.client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn list_shared_files(&self) -> Result<Vec<FileEntry>, ApiError> {
        let url = self.endpoint(&["shared_files"])?;
        let response = check(self.client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn share_file(&self, filepath: &str, password: &str) -> Result<FileId, ApiError> {
        let url = self.endpoint(&["shared_files"])?;
        let response = self
            .client
            .post(url)
            .json(&ShareRequest { filepath, password })
            .send()
            .await?;
        let body: ShareResponse = check(response).await?.json().await?;
        Ok(body.file_id)
    }

    async fn unshare_file(&self, id: &FileId) -> Result<(), ApiError> {
        let url = self.endpoint(&["shared_files", id.as_str()])?;
        check(self.client.delete(url).send().await?).await?;
        Ok(())
    }

    async fn list_peer_files(&self, address: &str, port: u16) -> Result<Vec<FileEntry>, ApiError> {
        let port = port.to_string();
        let url = self.endpoint(&["peers", address, &port, "files"])?;
        let response = check(self.client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn download(
        &self,
        address: &str,
        port: u16,
        id: &FileId,
        password: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let port = port.to_string();
        let url = self.endpoint(&["peers", address, &port, "download", id.as_str()])?;
        let response = self
            .client
            .post(url)
            .json(&DownloadRequest { password })
            .send()
            .await?;
        let bytes = check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
