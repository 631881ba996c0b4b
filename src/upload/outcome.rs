use serde::Deserialize;
use thiserror::Error;
use crate::core::UploadState;
use crate::notify::Severity;

/// Input problems caught before any request is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please choose a file to upload")]
    MissingFile,

    #[error("Please enter the upload password")]
    MissingCredential,
}

/// Why a session did not succeed. The `Display` text is what the user sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Network error ({0})")]
    Network(String),

    #[error("Upload failed: {}", .message.as_deref().unwrap_or("unknown error"))]
    ServerRejected {
        message: Option<String>,
    },

    #[error("Malformed server response")]
    MalformedResponse,

    #[error("File already exists, duplicate uploads are not allowed")]
    DuplicateFile,

    #[error("File too large, exceeds the server limit")]
    TooLarge,

    #[error("Incorrect upload password")]
    BadCredential,

    #[error("Invalid request parameters")]
    BadRequest,

    #[error("Server error ({status})")]
    ServerError {
        status: u16,
    },

    #[error("Upload cancelled")]
    UserCancelled,
}

/// Extra fields the server may return alongside `success: true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    /// Name the server stored the file under (sanitized)
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Terminal result of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(UploadReceipt),
    Failed(UploadError),
    Cancelled,
}

impl Outcome {
    pub fn state(&self) -> UploadState {
        match self {
            Self::Succeeded(_) => UploadState::Succeeded,
            Self::Failed(_) => UploadState::Failed,
            Self::Cancelled => UploadState::Cancelled,
        }
    }

    pub fn error(&self) -> Option<UploadError> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed(err) => Some(err.clone()),
            Self::Cancelled => Some(UploadError::UserCancelled),
        }
    }

    /// Inline status text for the view; also the notification text.
    pub fn message(&self) -> String {
        match self.error() {
            None => "File uploaded successfully!".to_string(),
            Some(err) => err.to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Succeeded(_) => Severity::Success,
            _ => Severity::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}
