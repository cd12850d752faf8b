use thiserror::Error;

/// Failure of a single backend call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend answered with a non-success status. `message` is the
    /// `error` field of the body when present, otherwise derived from the
    /// status.
    #[error("{message}")]
    Request { status: u16, message: String },

    /// No usable response: connection failure, or a body that could not
    /// be decoded.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        ApiError::Request {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request { status, .. } => Some(*status),
            ApiError::Transport(_) => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Transport(format!("invalid response body: {}", e))
    }
}
