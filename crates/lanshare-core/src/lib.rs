//! LanShare Core - client session for LAN file sharing
//!
//! Talks to the local LanShare backend to resolve the user's identity,
//! keep the peer roster and our own shares fresh, browse a peer's catalog
//! and negotiate (possibly password protected) downloads.

pub mod catalog;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod identity;
pub mod net;
pub mod poller;
pub mod roster;
pub mod session;
pub mod share;
pub mod sink;

#[cfg(test)]
mod fake;

// Re-export commonly used types
pub use catalog::CatalogViewer;
pub use client::Client;
pub use config::{ClientConfig, PollIntervals};
pub use download::{DownloadNegotiator, DownloadOutcome, DownloadState};
pub use error::{Error, Result};
pub use identity::IdentityManager;
pub use roster::RosterSync;
pub use session::{CatalogView, PendingDownload, Session};
pub use share::{ShareManager, ShareRequest, UnshareConfirmation};
pub use sink::{DirectorySink, FileSink};

pub use lanshare_api::{ApiError, Backend, FileEntry, FileId, HttpBackend, Peer};
