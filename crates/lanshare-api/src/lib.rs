//! LAN Share API - client side of the local backend's HTTP API.
//!
//! The backend owns discovery, storage and the peer-to-peer transfer
//! protocol. Everything the UI process needs from it goes through the
//! [`Backend`] trait; [`HttpBackend`] is the implementation that talks to
//! the real service.

pub mod error;
pub mod http;
pub mod model;

use async_trait::async_trait;

pub use error::ApiError;
pub use http::HttpBackend;
pub use model::{FileEntry, FileId, Peer};

/// Operations exposed by the local backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /identity`. `None` when the backend has no username.
    async fn get_identity(&self) -> Result<Option<String>, ApiError>;

    /// `POST /identity`. Returns the username as stored by the backend.
    async fn set_identity(&self, username: &str) -> Result<String, ApiError>;

    /// `GET /peers`.
    async fn list_peers(&self) -> Result<Vec<Peer>, ApiError>;

    /// `GET /shared_files`.
    async fn list_shared_files(&self) -> Result<Vec<FileEntry>, ApiError>;

    /// `POST /shared_files`. An empty password shares without protection.
    async fn share_file(&self, filepath: &str, password: &str) -> Result<FileId, ApiError>;

    /// `DELETE /shared_files/{id}`.
    async fn unshare_file(&self, id: &FileId) -> Result<(), ApiError>;

    /// `GET /peers/{address}/{port}/files`, proxied to the peer.
    async fn list_peer_files(&self, address: &str, port: u16) -> Result<Vec<FileEntry>, ApiError>;

    /// `POST /peers/{address}/{port}/download/{id}`. Returns the file bytes.
    async fn download(
        &self,
        address: &str,
        port: u16,
        id: &FileId,
        password: &str,
    ) -> Result<Vec<u8>, ApiError>;
}
