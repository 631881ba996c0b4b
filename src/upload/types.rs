use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use crate::core::{Credential, FilePayload, Result, SessionId, UploadProgress, UploadState};
use super::outcome::Outcome;

/// Observable view of the current (or most recent) submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSnapshot {
    /// `None` until the first submit
    pub session_id: Option<SessionId>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub state: UploadState,
    /// Only present while `InFlight`
    pub progress: Option<UploadProgress>,
    /// Only present once terminal
    pub outcome: Option<Outcome>,
    pub created_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    StateChanged {
        session_id: SessionId,
        old_state: UploadState,
        new_state: UploadState,
    },

    Progress {
        session_id: SessionId,
        progress: UploadProgress,
    },

    /// Exactly one per session
    Finished {
        session_id: SessionId,
        outcome: Outcome,
    },

    /// The input form should be cleared (success only)
    FormReset {
        session_id: SessionId,
    },

    /// The file list should be reloaded
    ListingRefreshDue {
        session_id: SessionId,
    },

    /// The progress display should be hidden
    ProgressHidden {
        session_id: SessionId,
    },
}

impl UploadEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::StateChanged { session_id, .. }
            | Self::Progress { session_id, .. }
            | Self::Finished { session_id, .. }
            | Self::FormReset { session_id }
            | Self::ListingRefreshDue { session_id }
            | Self::ProgressHidden { session_id } => *session_id,
        }
    }
}

pub(crate) enum SessionCommand {
    Submit {
        file: Option<FilePayload>,
        credential: Credential,
        reply: oneshot::Sender<Result<SessionId>>,
    },

    /// Replies whether a transfer was actually cancelled
    Cancel {
        reply: oneshot::Sender<bool>,
    },

    Shutdown,
}

const _: () = {
    fn assert_send<T: Send>() {}
    fn assert_types() {
        assert_send::<UploadSnapshot>();
        assert_send::<UploadEvent>();
        assert_send::<SessionCommand>();
    }
};
