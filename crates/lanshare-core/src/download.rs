//! Download Negotiator.
//!
//! Turns a file picked from a peer's catalog into a saved local file:
//!
//! ```text
//! Idle --request--> PasswordPrompted --submit_password--> Transferring
//!          \------------------------------------------->/        |
//!                                                    Completed | Failed
//! ```
//!
//! At most one [`PendingDownload`] exists. Every `request_download`
//! replaces it and bumps a sequence number; a transfer whose number is no
//! longer current does not touch the session when it returns.

use crate::error::{Error, Result};
use crate::session::{PendingDownload, Session, SessionState};
use crate::sink::FileSink;
use lanshare_api::{Backend, FileEntry, Peer};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DownloadState {
    #[default]
    Idle,
    /// Waiting for the user to type the file's password.
    PasswordPrompted,
    Transferring,
    Completed {
        file_name: String,
        saved_to: PathBuf,
    },
    /// The pending download is kept so the user can retry.
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The password prompt is open; call `submit_password`.
    PasswordRequired,
    Completed(PathBuf),
    /// A newer download request replaced this one while it was in flight.
    Superseded,
}

#[derive(Clone)]
pub struct DownloadNegotiator {
    backend: Arc<dyn Backend>,
    session: Session,
    sink: Arc<dyn FileSink>,
    recheck_password: bool,
}

/// Claim the pending download for a password submission.
fn awaiting_password(s: &SessionState) -> Result<(u64, PendingDownload)> {
    match (&s.pending, s.password_prompt, &s.download) {
        (Some(pending), true, DownloadState::PasswordPrompted | DownloadState::Failed { .. }) => {
            Ok((s.download_seq, pending.clone()))
        }
        _ => Err(Error::InvalidState("no download is waiting for a password")),
    }
}

impl DownloadNegotiator {
    pub fn new(backend: Arc<dyn Backend>, session: Session, sink: Arc<dyn FileSink>) -> Self {
        Self {
            backend,
            session,
            sink,
            recheck_password: true,
        }
    }

    /// Whether an empty password submission re-fetches the catalog to see
    /// if the file's password flag went stale.
    pub fn with_password_recheck(mut self, enabled: bool) -> Self {
        self.recheck_password = enabled;
        self
    }

    /// Start negotiating `file` from `peer`, discarding whatever download
    /// was pending before. Unprotected files transfer right away with an
    /// empty password; protected ones open the password prompt.
    pub async fn request_download(&self, peer: &Peer, file: &FileEntry) -> Result<DownloadOutcome> {
        let pending = PendingDownload::new(peer, file);

        let seq = self.session.write(|s| {
            if let Some(previous) = s.pending.replace(pending.clone()) {
                tracing::debug!("Discarding pending download of {}", previous.file_name);
            }
            s.download_seq += 1;
            if pending.needs_password {
                s.download = DownloadState::PasswordPrompted;
                s.password_prompt = true;
            } else {
                s.download = DownloadState::Transferring;
                s.password_prompt = false;
            }
            s.download_seq
        });

        if pending.needs_password {
            tracing::info!("{} is password protected, waiting for password", pending.file_name);
            return Ok(DownloadOutcome::PasswordRequired);
        }
        self.transfer(seq, pending, String::new()).await
    }

    /// Answer the password prompt. An empty password is always rejected
    /// locally and never reaches the backend's download endpoint.
    pub async fn submit_password(&self, password: &str) -> Result<DownloadOutcome> {
        if password.is_empty() {
            let (_, pending) = self.session.read(awaiting_password)?;
            if self.recheck_password && !self.password_still_required(&pending).await {
                return Err(Error::Validation(
                    "This file no longer needs a password. Request the download again.",
                ));
            }
            return Err(Error::Validation("Password is required for this file."));
        }

        let (seq, pending) = self.session.write(|s| {
            let claim = awaiting_password(s)?;
            s.download = DownloadState::Transferring;
            Ok::<_, Error>(claim)
        })?;
        self.transfer(seq, pending, password.to_string()).await
    }

    /// Try a failed unprotected download again. Protected downloads are
    /// retried through `submit_password`.
    pub async fn retry(&self) -> Result<DownloadOutcome> {
        let (seq, pending) = self.session.write(|s| {
            let pending = match (&s.pending, &s.download) {
                (Some(pending), DownloadState::Failed { .. }) if !pending.needs_password => {
                    pending.clone()
                }
                (Some(_), DownloadState::Failed { .. }) => {
                    return Err(Error::InvalidState("this download needs a password"))
                }
                _ => return Err(Error::InvalidState("there is no failed download to retry")),
            };
            s.download = DownloadState::Transferring;
            Ok((s.download_seq, pending))
        })?;
        self.transfer(seq, pending, String::new()).await
    }

    /// Fresh look at the peer's catalog. Anything short of a positive
    /// "no password" answer counts as still required.
    async fn password_still_required(&self, pending: &PendingDownload) -> bool {
        match self
            .backend
            .list_peer_files(&pending.peer_address, pending.peer_port)
            .await
        {
            Ok(files) => files
                .iter()
                .find(|f| f.id == pending.file_id)
                .map_or(true, |f| f.has_password),
            Err(e) => {
                tracing::debug!("Password re-check failed, assuming required: {}", e);
                true
            }
        }
    }

    fn is_current(&self, seq: u64) -> bool {
        self.session.read(|s| s.download_seq == seq)
    }

    fn fail(&self, seq: u64, message: String) {
        self.session.write(|s| {
            if s.download_seq == seq {
                s.download = DownloadState::Failed { message };
            }
        });
    }

    async fn transfer(
        &self,
        seq: u64,
        pending: PendingDownload,
        password: String,
    ) -> Result<DownloadOutcome> {
        tracing::info!(
            "Attempting to download {} from {}:{} (ID: {})",
            pending.file_name,
            pending.peer_address,
            pending.peer_port,
            pending.file_id
        );

        let result = self
            .backend
            .download(&pending.peer_address, pending.peer_port, &pending.file_id, &password)
            .await;

        if !self.is_current(seq) {
            tracing::debug!("Dropping result of superseded download {}", pending.file_name);
            return Ok(DownloadOutcome::Superseded);
        }

        let contents = match result {
            Ok(contents) => contents,
            Err(e) => {
                tracing::error!("Download failed for {}: {}", pending.file_name, e);
                self.fail(seq, e.to_string());
                return Err(e.into());
            }
        };

        let saved_to = match self.sink.save(&pending.file_name, &contents).await {
            Ok(path) => path,
            Err(source) => {
                let err = Error::Save {
                    name: pending.file_name.clone(),
                    source,
                };
                tracing::error!("{}", err);
                self.fail(seq, err.to_string());
                return Err(err);
            }
        };

        self.session.write(|s| {
            if s.download_seq == seq {
                s.pending = None;
                s.password_prompt = false;
                s.download = DownloadState::Completed {
                    file_name: pending.file_name.clone(),
                    saved_to: saved_to.clone(),
                };
            }
        });
        tracing::info!(
            "{} downloaded ({} bytes) to {}",
            pending.file_name,
            contents.len(),
            saved_to.display()
        );
        Ok(DownloadOutcome::Completed(saved_to))
    }
}
