//! In-memory [`Backend`] for tests.

use async_trait::async_trait;
use lanshare_api::{ApiError, Backend, FileEntry, FileId, Peer};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Default)]
pub(crate) struct FakeState {
    pub username: Option<String>,
    pub identity_get_error: Option<ApiError>,
    /// Returned by `set_identity` instead of the submitted name.
    pub normalized_username: Option<String>,
    pub identity_error: Option<ApiError>,
    pub peers: Vec<Peer>,
    pub peers_error: Option<ApiError>,
    pub shared: Vec<FileEntry>,
    pub shared_error: Option<ApiError>,
    pub share_errors: HashMap<String, ApiError>,
    pub unshare_error: Option<ApiError>,
    pub next_id: u64,
    /// Catalog per peer address.
    pub catalogs: HashMap<String, Vec<FileEntry>>,
    pub catalog_errors: HashMap<String, ApiError>,
    pub passwords: HashMap<FileId, String>,
    pub contents: HashMap<FileId, Vec<u8>>,
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub state: Mutex<FakeState>,
    calls: Mutex<Vec<String>>,
    /// Gate per key, and whether it only holds the next matching call.
    gates: Mutex<HashMap<String, (Arc<Semaphore>, bool)>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(f: impl FnOnce(&mut FakeState)) -> Arc<Self> {
        let backend = Self::default();
        f(&mut backend.state.lock());
        Arc::new(backend)
    }

    /// Hold every call matching `key` until a permit is added to the
    /// returned semaphore.
    pub fn gate(&self, key: &str) -> Arc<Semaphore> {
        self.install_gate(key, false)
    }

    /// Like [`Self::gate`], but later calls matching `key` pass freely.
    pub fn gate_once(&self, key: &str) -> Arc<Semaphore> {
        self.install_gate(key, true)
    }

    fn install_gate(&self, key: &str, once: bool) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates.lock().insert(key.to_string(), (gate.clone(), once));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    async fn enter(&self, call: String, key: &str) {
        self.calls.lock().push(call);
        let gate = {
            let mut gates = self.gates.lock();
            match gates.get(key).cloned() {
                Some((gate, true)) => {
                    gates.remove(key);
                    Some(gate)
                }
                Some((gate, false)) => Some(gate),
                None => None,
            }
        };
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

pub(crate) fn peer(username: &str, address: &str) -> Peer {
    Peer {
        username: username.to_string(),
        address: address.to_string(),
        port: 19001,
    }
}

pub(crate) fn file(id: &str, name: &str, has_password: bool) -> FileEntry {
    FileEntry {
        id: FileId::from(id),
        name: name.to_string(),
        size: 1024,
        has_password,
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn get_identity(&self) -> Result<Option<String>, ApiError> {
        self.enter("GET /identity".into(), "identity").await;
        let state = self.state.lock();
        match &state.identity_get_error {
            Some(err) => Err(err.clone()),
            None => Ok(state.username.clone()),
        }
    }

    async fn set_identity(&self, username: &str) -> Result<String, ApiError> {
        self.enter(format!("POST /identity {}", username), "identity").await;
        let mut state = self.state.lock();
        if let Some(err) = state.identity_error.clone() {
            return Err(err);
        }
        let accepted = state
            .normalized_username
            .clone()
            .unwrap_or_else(|| username.to_string());
        state.username = Some(accepted.clone());
        Ok(accepted)
    }

    // List responses reflect the state when the request arrived, so a
    // gated call answers with data that may be stale by the time it returns.
    async fn list_peers(&self) -> Result<Vec<Peer>, ApiError> {
        let snapshot = {
            let state = self.state.lock();
            match &state.peers_error {
                Some(err) => Err(err.clone()),
                None => Ok(state.peers.clone()),
            }
        };
        self.enter("GET /peers".into(), "peers").await;
        snapshot
    }

    async fn list_shared_files(&self) -> Result<Vec<FileEntry>, ApiError> {
        let snapshot = {
            let state = self.state.lock();
            match &state.shared_error {
                Some(err) => Err(err.clone()),
                None => Ok(state.shared.clone()),
            }
        };
        self.enter("GET /shared_files".into(), "shared_files").await;
        snapshot
    }

    async fn share_file(&self, filepath: &str, password: &str) -> Result<FileId, ApiError> {
        self.enter(format!("POST /shared_files {}", filepath), "share").await;
        let mut state = self.state.lock();
        if let Some(err) = state.share_errors.get(filepath) {
            return Err(err.clone());
        }
        let id = FileId::from(state.next_id);
        state.next_id += 1;
        let name = filepath.rsplit('/').next().unwrap_or(filepath).to_string();
        state.shared.push(FileEntry {
            id: id.clone(),
            name,
            size: 0,
            has_password: !password.is_empty(),
        });
        Ok(id)
    }

    async fn unshare_file(&self, id: &FileId) -> Result<(), ApiError> {
        self.enter(format!("DELETE /shared_files/{}", id), "unshare").await;
        let mut state = self.state.lock();
        if let Some(err) = state.unshare_error.clone() {
            return Err(err);
        }
        let before = state.shared.len();
        state.shared.retain(|f| &f.id != id);
        if state.shared.len() == before {
            return Err(ApiError::request(404, "File not found or could not be unshared"));
        }
        Ok(())
    }

    async fn list_peer_files(&self, address: &str, port: u16) -> Result<Vec<FileEntry>, ApiError> {
        self.enter(
            format!("GET /peers/{}/{}/files", address, port),
            &format!("files:{}", address),
        )
        .await;
        let state = self.state.lock();
        if let Some(err) = state.catalog_errors.get(address) {
            return Err(err.clone());
        }
        Ok(state.catalogs.get(address).cloned().unwrap_or_default())
    }

    async fn download(
        &self,
        address: &str,
        port: u16,
        id: &FileId,
        password: &str,
    ) -> Result<Vec<u8>, ApiError> {
        self.enter(
            format!("POST /peers/{}/{}/download/{} password={:?}", address, port, id, password),
            &format!("download:{}", id),
        )
        .await;
        let state = self.state.lock();
        let listed = state
            .catalogs
            .get(address)
            .map(|files| files.iter().any(|f| &f.id == id))
            .unwrap_or(false);
        if !listed {
            return Err(ApiError::request(404, "File not found or not shared"));
        }
        if let Some(expected) = state.passwords.get(id) {
            if expected != password {
                return Err(ApiError::request(403, "Incorrect password"));
            }
        }
        Ok(state.contents.get(id).cloned().unwrap_or_default())
    }
}
