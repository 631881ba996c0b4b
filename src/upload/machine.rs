use crate::core::{Credential, FilePayload, SessionId, TransportResponse, UploadProgress, UploadState};
use super::classify::classify;
use super::outcome::{Outcome, UploadError, ValidationError};

/// Everything a transport can report, in the order it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Request is about to go out
    Opened,
    Progress(UploadProgress),
    Completed(TransportResponse),
    NetworkError(String),
    Aborted,
}

/// A transport event tagged with the session that produced it.
#[derive(Debug, Clone)]
pub(crate) struct TransportSignal {
    pub session_id: SessionId,
    pub event: TransportEvent,
}

impl TransportSignal {
    pub fn new(session_id: SessionId, event: TransportEvent) -> Self {
        Self { session_id, event }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Event does not apply to the current state
    Ignore,
    Enter(UploadState),
    Progress(UploadProgress),
    Finish(Outcome),
}

/// The session state machine, without side effects.
pub fn reduce(state: UploadState, event: TransportEvent) -> Transition {
    use UploadState::*;

    match (state, event) {
        (Submitting, TransportEvent::Opened) => Transition::Enter(InFlight),
        (InFlight, TransportEvent::Progress(progress)) => Transition::Progress(progress),
        (InFlight, TransportEvent::Completed(response)) => {
            Transition::Finish(classify(response.status, &response.body))
        }
        (InFlight, TransportEvent::NetworkError(reason)) => {
            Transition::Finish(Outcome::Failed(UploadError::Network(reason)))
        }
        (InFlight, TransportEvent::Aborted) => Transition::Finish(Outcome::Cancelled),
        _ => Transition::Ignore,
    }
}

/// Checks submit inputs and hands back the file when they are usable.
pub fn validate(file: Option<FilePayload>, credential: &Credential) -> Result<FilePayload, ValidationError> {
    let file = file.ok_or(ValidationError::MissingFile)?;
    if credential.is_blank() {
        return Err(ValidationError::MissingCredential);
    }

    Ok(file)
}
