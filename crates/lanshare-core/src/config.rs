use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root of the local backend's API
    pub api_base_url: String,

    /// Seconds between peer roster polls
    pub peer_poll_secs: u64,

    /// Seconds between own-share polls
    pub own_files_poll_secs: u64,

    /// TCP connect timeout for backend calls. Requests themselves have no
    /// deadline so long downloads are not cut off.
    pub connect_timeout_secs: u64,

    /// Directory completed downloads are written to
    pub download_dir: PathBuf,

    /// Re-fetch the peer's catalog when an empty password is submitted
    pub recheck_password: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:19001/api".to_string(),
            peer_poll_secs: 5,
            own_files_poll_secs: 10,
            connect_timeout_secs: 10,
            download_dir: dirs::download_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("lanshare"),
            recheck_password: true,
        }
    }
}

impl ClientConfig {
    /// Load a JSON config file; absent fields keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: ClientConfig = serde_json::from_str(&json)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.peer_poll_secs == 0 || self.own_files_poll_secs == 0 {
            anyhow::bail!("poll intervals must be at least one second");
        }
        Ok(())
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_download_dir(mut self, dir: PathBuf) -> Self {
        self.download_dir = dir;
        self
    }

    pub fn poll_intervals(&self) -> PollIntervals {
        PollIntervals {
            peers: Duration::from_secs(self.peer_poll_secs),
            own_files: Duration::from_secs(self.own_files_poll_secs),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ensure_download_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.download_dir)
            .with_context(|| format!("creating {}", self.download_dir.display()))?;
        Ok(())
    }
}

/// Cadence of the two recurring roster fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub peers: Duration,
    pub own_files: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            peers: Duration::from_secs(5),
            own_files: Duration::from_secs(10),
        }
    }
}
