use thiserror::Error;

#[derive(Error, Debug)]
pub enum BeamError {
    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A second submit arrived while a transfer still holds the transport slot.
    #[error("An upload is already in progress")]
    SessionBusy,

    #[error("Upload session shut down")]
    SessionShutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BeamError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

pub type Result<T, E = BeamError> = std::result::Result<T, E>;
