use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Identifier of a shared file as assigned by the backend.
///
/// The backend hands out hex digests, but some deployments use plain
/// integers, so both JSON shapes are accepted. It always travels in URLs
/// as its string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for FileId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl Serialize for FileId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FileId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => FileId(s),
            Raw::Unsigned(n) => FileId(n.to_string()),
            Raw::Signed(n) => FileId(n.to_string()),
        })
    }
}

/// Another participant on the LAN as reported by the backend's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub username: String,
    pub address: String,
    pub port: u16,
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.username, self.address, self.port)
    }
}

/// One entry of a catalog, either our own shares or a peer's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub has_password: bool,
}

impl FileEntry {
    /// Size in MiB with two decimals, as shown in listings.
    pub fn size_mb(&self) -> String {
        format!("{:.2} MB", self.size as f64 / 1024.0 / 1024.0)
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        if self.has_password {
            format!("{} ({}) (Protected)", self.name, self.size_mb())
        } else {
            format!("{} ({})", self.name, self.size_mb())
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct IdentityBody {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetIdentityRequest<'a> {
    pub username: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ShareRequest<'a> {
    pub filepath: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShareResponse {
    pub file_id: FileId,
}

#[derive(Debug, Serialize)]
pub(crate) struct DownloadRequest<'a> {
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
