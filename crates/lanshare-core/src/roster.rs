//! Roster Synchronizer: keeps the peer roster and our own share list fresh.
//!
//! The two snapshots are polled on independent schedules. A failed cycle
//! keeps the previous snapshot; nothing is cleared on a transient error.

use crate::config::PollIntervals;
use crate::error::Result;
use crate::net::same_host;
use crate::poller::PeriodicTask;
use crate::session::Session;
use lanshare_api::{Backend, Peer};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone)]
struct Fetcher {
    backend: Arc<dyn Backend>,
    session: Session,
    own_hosts: Arc<Vec<String>>,
}

impl Fetcher {
    fn is_self(&self, peer: &Peer, me: &str) -> bool {
        peer.username == me && self.own_hosts.iter().any(|h| same_host(h, &peer.address))
    }

    /// `Ok(None)` when a newer request was issued while this one was in
    /// flight; its response is dropped.
    async fn fetch_peers(&self) -> Result<Option<usize>> {
        let me = self.session.require_identity()?;
        let seq = self.session.write(|s| {
            s.peers_seq += 1;
            s.peers_seq
        });
        let peers = self.backend.list_peers().await.map_err(|e| {
            tracing::warn!("Error fetching peers: {}", e);
            e
        })?;

        let peers: Vec<Peer> = peers.into_iter().filter(|p| !self.is_self(p, &me)).collect();
        let count = peers.len();
        let applied = self.session.write(|s| {
            if s.peers_seq != seq {
                return false;
            }
            s.peers = peers;
            true
        });
        if !applied {
            tracing::debug!("Discarding stale peer roster response");
            return Ok(None);
        }
        tracing::debug!("Peer roster refreshed: {} peer(s)", count);
        Ok(Some(count))
    }

    async fn fetch_own_files(&self) -> Result<Option<usize>> {
        self.session.require_identity()?;
        let seq = self.session.write(|s| {
            s.own_files_seq += 1;
            s.own_files_seq
        });
        let files = self.backend.list_shared_files().await.map_err(|e| {
            tracing::warn!("Error fetching my shared files: {}", e);
            e
        })?;

        let count = files.len();
        let applied = self.session.write(|s| {
            if s.own_files_seq != seq {
                return false;
            }
            s.own_files = files;
            true
        });
        if !applied {
            tracing::debug!("Discarding stale own-files response");
            return Ok(None);
        }
        tracing::debug!("Own shares refreshed: {} file(s)", count);
        Ok(Some(count))
    }
}

#[derive(Default)]
struct Schedules {
    /// Bumped by every start and stop so an in-flight start can tell it
    /// has been superseded.
    generation: u64,
    peers: Option<PeriodicTask>,
    own_files: Option<PeriodicTask>,
}

impl Schedules {
    fn clear(&mut self) -> bool {
        let was_running = self.peers.is_some() || self.own_files.is_some();
        if let Some(mut task) = self.peers.take() {
            task.stop();
        }
        if let Some(mut task) = self.own_files.take() {
            task.stop();
        }
        was_running
    }
}

#[derive(Clone)]
pub struct RosterSync {
    fetcher: Fetcher,
    intervals: PollIntervals,
    schedules: Arc<Mutex<Schedules>>,
}

impl RosterSync {
    /// `own_hosts` are the addresses under which our own backend may show
    /// up in the roster; see [`crate::net::local_hosts`].
    pub fn new(
        backend: Arc<dyn Backend>,
        session: Session,
        intervals: PollIntervals,
        own_hosts: Vec<String>,
    ) -> Self {
        Self {
            fetcher: Fetcher {
                backend,
                session,
                own_hosts: Arc::new(own_hosts),
            },
            intervals,
            schedules: Arc::new(Mutex::new(Schedules::default())),
        }
    }

    /// Fetch both snapshots immediately, then keep polling. Any previous
    /// schedule is cleared first, so calling this twice never leaves two
    /// pollers running.
    pub async fn start(&self) -> Result<()> {
        self.fetcher.session.require_identity()?;

        let generation = {
            let mut schedules = self.schedules.lock();
            schedules.clear();
            schedules.generation += 1;
            schedules.generation
        };

        // Failures are logged by the fetchers and do not stop polling.
        let _ = tokio::join!(self.fetcher.fetch_peers(), self.fetcher.fetch_own_files());

        let mut schedules = self.schedules.lock();
        if schedules.generation != generation {
            tracing::debug!("Roster start superseded before scheduling");
            return Ok(());
        }

        let fetcher = self.fetcher.clone();
        schedules.peers = Some(PeriodicTask::spawn("peers", self.intervals.peers, move || {
            let fetcher = fetcher.clone();
            async move {
                let _ = fetcher.fetch_peers().await;
            }
        }));

        let fetcher = self.fetcher.clone();
        schedules.own_files = Some(PeriodicTask::spawn(
            "own_files",
            self.intervals.own_files,
            move || {
                let fetcher = fetcher.clone();
                async move {
                    let _ = fetcher.fetch_own_files().await;
                }
            },
        ));

        tracing::info!(
            "Periodic fetching started (peers every {:?}, own files every {:?})",
            self.intervals.peers,
            self.intervals.own_files
        );
        Ok(())
    }

    /// Cancel both schedules. Safe to call when already stopped.
    pub fn stop(&self) {
        let mut schedules = self.schedules.lock();
        schedules.generation += 1;
        if schedules.clear() {
            tracing::info!("Periodic fetching stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        let schedules = self.schedules.lock();
        schedules.peers.as_ref().map_or(false, |t| t.is_running())
            && schedules.own_files.as_ref().map_or(false, |t| t.is_running())
    }

    /// One roster fetch. On failure the previous roster is kept; a
    /// response overtaken by a newer request is dropped (`Ok(None)`).
    pub async fn fetch_peers(&self) -> Result<Option<usize>> {
        self.fetcher.fetch_peers().await
    }

    /// One own-share fetch, with the same rules as [`Self::fetch_peers`].
    pub async fn fetch_own_files(&self) -> Result<Option<usize>> {
        self.fetcher.fetch_own_files().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fake::{file, peer, FakeBackend};
    use lanshare_api::ApiError;
    use std::time::Duration;
    use tokio::time::sleep;

    fn roster(backend: Arc<FakeBackend>, identity: Option<&str>) -> (RosterSync, Session) {
        let session = Session::new();
        if let Some(name) = identity {
            session.accept_identity(name.to_string());
        }
        let sync = RosterSync::new(
            backend,
            session.clone(),
            PollIntervals::default(),
            vec!["192.168.1.10".to_string()],
        );
        (sync, session)
    }

    #[tokio::test]
    async fn test_start_requires_identity() {
        let backend = FakeBackend::new();
        let (sync, _) = roster(backend.clone(), None);

        assert!(matches!(sync.start().await, Err(Error::NoIdentity)));
        assert!(backend.calls().is_empty());
        assert!(!sync.is_running());
    }

    #[tokio::test]
    async fn test_start_fetches_immediately() {
        let backend = FakeBackend::with(|s| {
            s.peers = vec![peer("bob", "192.168.1.11")];
            s.shared = vec![file("1", "a.txt", false)];
        });
        let (sync, session) = roster(backend.clone(), Some("alice"));

        sync.start().await.unwrap();
        assert_eq!(backend.count("GET /peers"), 1);
        assert_eq!(backend.count("GET /shared_files"), 1);
        assert_eq!(session.peers().len(), 1);
        assert_eq!(session.own_files().len(), 1);
        assert!(sync.is_running());
        sync.stop();
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_roster() {
        let backend = FakeBackend::with(|s| {
            s.peers = vec![peer("bob", "192.168.1.11"), peer("carol", "192.168.1.12")];
        });
        let (sync, session) = roster(backend.clone(), Some("alice"));

        assert_eq!(sync.fetch_peers().await.unwrap(), Some(2));
        backend.state.lock().peers_error = Some(ApiError::Transport("connection refused".into()));
        assert!(sync.fetch_peers().await.unwrap_err().is_transport());
        assert_eq!(session.peers().len(), 2);

        backend.state.lock().peers_error = Some(ApiError::request(500, "boom"));
        assert!(sync.fetch_peers().await.is_err());
        assert_eq!(session.peers()[1].username, "carol");
    }

    #[tokio::test]
    async fn test_peer_failure_does_not_block_own_files() {
        let backend = FakeBackend::with(|s| {
            s.peers_error = Some(ApiError::Transport("timed out".into()));
            s.shared = vec![file("1", "a.txt", false), file("2", "b.txt", true)];
        });
        let (sync, session) = roster(backend, Some("alice"));

        sync.start().await.unwrap();
        assert!(session.peers().is_empty());
        assert_eq!(session.own_files().len(), 2);
        sync.stop();
    }

    #[tokio::test]
    async fn test_failed_own_files_fetch_keeps_previous_list() {
        let backend = FakeBackend::with(|s| s.shared = vec![file("1", "a.txt", false)]);
        let (sync, session) = roster(backend.clone(), Some("alice"));

        assert_eq!(sync.fetch_own_files().await.unwrap(), Some(1));
        backend.state.lock().shared_error = Some(ApiError::Transport("connection reset".into()));
        assert!(sync.fetch_own_files().await.unwrap_err().is_transport());
        assert_eq!(session.own_files(), vec![file("1", "a.txt", false)]);

        backend.state.lock().shared_error = Some(ApiError::request(500, "boom"));
        assert!(sync.fetch_own_files().await.unwrap_err().is_request());
        assert_eq!(session.own_files().len(), 1);
    }

    #[tokio::test]
    async fn test_own_files_failure_does_not_block_peers() {
        let backend = FakeBackend::with(|s| {
            s.peers = vec![peer("bob", "192.168.1.11")];
            s.shared_error = Some(ApiError::Transport("timed out".into()));
        });
        let (sync, session) = roster(backend, Some("alice"));

        sync.start().await.unwrap();
        assert_eq!(session.peers(), vec![peer("bob", "192.168.1.11")]);
        assert!(session.own_files().is_empty());
        assert!(sync.is_running());
        sync.stop();
    }

    #[tokio::test]
    async fn test_stale_roster_response_is_dropped() {
        let backend = FakeBackend::with(|s| s.peers = vec![peer("bob", "192.168.1.11")]);
        let (sync, session) = roster(backend.clone(), Some("alice"));
        let slow = backend.gate_once("peers");

        let first = sync.fetch_peers();
        let second = async {
            while backend.count("GET /peers") == 0 {
                tokio::task::yield_now().await;
            }
            backend.state.lock().peers = vec![peer("carol", "192.168.1.12")];
            let fresh = sync.fetch_peers().await;
            slow.add_permits(1);
            fresh
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap(), None);
        assert_eq!(second.unwrap(), Some(1));
        assert_eq!(session.peers(), vec![peer("carol", "192.168.1.12")]);
    }

    #[tokio::test]
    async fn test_self_is_filtered_by_name_and_host() {
        let backend = FakeBackend::with(|s| {
            s.peers = vec![
                peer("alice", "192.168.1.10"),
                peer("alice", "192.168.1.44"),
                peer("bob", "192.168.1.10"),
            ];
        });
        let (sync, session) = roster(backend, Some("alice"));

        assert_eq!(sync.fetch_peers().await.unwrap(), Some(2));
        let peers = session.peers();
        assert_eq!(peers[0], peer("alice", "192.168.1.44"));
        assert_eq!(peers[1], peer("bob", "192.168.1.10"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_cadences_and_idempotent_stop() {
        let backend = FakeBackend::new();
        let (sync, _) = roster(backend.clone(), Some("alice"));

        sync.start().await.unwrap();
        sleep(Duration::from_millis(10_100)).await;
        assert_eq!(backend.count("GET /peers"), 3);
        assert_eq!(backend.count("GET /shared_files"), 2);

        sync.stop();
        sync.stop();
        assert!(!sync.is_running());
        sleep(Duration::from_secs(60)).await;
        assert_eq!(backend.count("GET /peers"), 3);
        assert_eq!(backend.count("GET /shared_files"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_does_not_duplicate_schedules() {
        let backend = FakeBackend::new();
        let (sync, _) = roster(backend.clone(), Some("alice"));

        sync.start().await.unwrap();
        sync.start().await.unwrap();
        assert_eq!(backend.count("GET /peers"), 2);

        sleep(Duration::from_millis(5_100)).await;
        assert_eq!(backend.count("GET /peers"), 3);
        sync.stop();
    }
}
