use lanshare_api::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad local input; never sent to the backend.
    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("username is not set")]
    NoIdentity,

    #[error("username is already set to {0}")]
    IdentityLocked(String),

    #[error("{0}")]
    InvalidState(&'static str),

    #[error("failed to save {name}: {source}")]
    Save {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// True when the backend answered with an error status.
    pub fn is_request(&self) -> bool {
        matches!(self, Error::Api(ApiError::Request { .. }))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Api(ApiError::Transport(_)))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
