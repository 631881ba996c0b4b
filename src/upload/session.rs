use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use crate::config::SessionTimings;
use crate::core::{BeamError, Credential, FilePayload, Result, SessionId, UploadTransport};
use crate::notify::NotificationQueue;
use super::session_worker::SessionWorker;
use super::types::{SessionCommand, UploadEvent, UploadSnapshot};

/// Cheap, cloneable front end of the upload controller.
///
/// All state lives in a worker task; this handle only sends commands and
/// exposes the observable snapshot and event stream.
#[derive(Clone)]
pub struct UploadSession {
    command_tx: mpsc::Sender<SessionCommand>,
    event_tx: broadcast::Sender<UploadEvent>,
    state_rx: watch::Receiver<UploadSnapshot>,
}

/// Upload session plus its worker task.
pub struct UploadSessionHandle {
    pub session: UploadSession,
    pub worker_handle: JoinHandle<()>,
}

impl UploadSessionHandle {
    /// Stops the worker, aborting any in-flight transfer and pending timers.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.session.command_tx.send(SessionCommand::Shutdown).await;
        self.worker_handle
            .await
            .map_err(|err| BeamError::internal(format!("Worker panic: {}", err)))
    }
}

impl UploadSession {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        notifications: NotificationQueue,
        timings: SessionTimings,
    ) -> UploadSessionHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(256);
        let (state_tx, state_rx) = watch::channel(UploadSnapshot::default());

        let worker_handle = tokio::spawn(SessionWorker::run(
            transport,
            notifications,
            timings,
            command_rx,
            event_tx.clone(),
            state_tx,
        ));

        let session = Self {
            command_tx,
            event_tx,
            state_rx,
        };

        UploadSessionHandle {
            session,
            worker_handle,
        }
    }

    /// Starts a new upload.
    ///
    /// Missing inputs do not produce an `Err`: the new session goes straight
    /// to `Failed` without touching the transport. `Err(SessionBusy)` means an
    /// earlier upload still holds the transport and nothing was started.
    pub async fn submit(&self, file: Option<FilePayload>, credential: impl Into<Credential>) -> Result<SessionId> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(SessionCommand::Submit {
                file,
                credential: credential.into(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| BeamError::SessionShutdown)?;

        reply_rx
            .await
            .map_err(|_| BeamError::SessionShutdown)?
    }

    /// Aborts the in-flight upload. Returns `false` when there was nothing to cancel.
    pub async fn cancel(&self) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(SessionCommand::Cancel { reply: reply_tx })
            .await
            .map_err(|_| BeamError::SessionShutdown)?;

        reply_rx
            .await
            .map_err(|_| BeamError::SessionShutdown)
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        self.state_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<UploadSnapshot> {
        self.state_rx.clone()
    }

    /// Subscribe to session events.
    ///
    /// A receiver that falls more than 256 events behind gets a `Lagged` error
    /// and skips ahead.
    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    /// Waits until the current session no longer holds the transport.
    pub async fn settled(&self) -> Result<UploadSnapshot> {
        let mut state_rx = self.watch();
        let snapshot = state_rx
            .wait_for(|snapshot| !snapshot.state.is_active())
            .await
            .map_err(|_| BeamError::SessionShutdown)?;

        Ok(snapshot.clone())
    }
}
