use std::sync::Arc;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::config::SessionTimings;
use crate::core::{
    BeamError,
    Credential,
    DelayedTasks,
    FilePayload,
    ProgressCallback,
    Result,
    SessionId,
    UploadProgress,
    UploadState,
    UploadTransport,
};
use crate::notify::NotificationQueue;
use super::machine::{reduce, validate, Transition, TransportEvent, TransportSignal};
use super::outcome::{Outcome, UploadError};
use super::types::{SessionCommand, UploadEvent, UploadSnapshot};

/// The one transport a session may hold.
struct TransportSlot {
    session_id: SessionId,
    cancellation_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

/// Owns all session state. Commands and transport signals are handled one at
/// a time on this task, so no locking is needed around the snapshot.
pub(crate) struct SessionWorker {
    transport: Arc<dyn UploadTransport>,
    notifications: NotificationQueue,
    timings: SessionTimings,
    snapshot: UploadSnapshot,
    slot: Option<TransportSlot>,
    timers: DelayedTasks,

    event_tx: broadcast::Sender<UploadEvent>,
    state_tx: watch::Sender<UploadSnapshot>,
    signal_tx: mpsc::UnboundedSender<TransportSignal>,
    signal_rx: mpsc::UnboundedReceiver<TransportSignal>,
}

impl SessionWorker {
    pub(crate) async fn run(
        transport: Arc<dyn UploadTransport>,
        notifications: NotificationQueue,
        timings: SessionTimings,
        mut command_rx: mpsc::Receiver<SessionCommand>,
        event_tx: broadcast::Sender<UploadEvent>,
        state_tx: watch::Sender<UploadSnapshot>,
    ) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let mut worker = Self {
            transport,
            notifications,
            timings,
            snapshot: UploadSnapshot::default(),
            slot: None,
            timers: DelayedTasks::new(),
            event_tx,
            state_tx,
            signal_tx,
            signal_rx,
        };

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    let Some(command) = command else { break };
                    if !worker.handle_command(command) {
                        break;
                    }
                }
                Some(signal) = worker.signal_rx.recv() => {
                    worker.handle_signal(signal);
                }
            }
        }

        worker.teardown();
    }

    /// Returns `false` once the worker should stop.
    fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Submit { file, credential, reply } => {
                let result = self.submit(file, credential);
                let _ = reply.send(result);
            }
            SessionCommand::Cancel { reply } => {
                let cancelled = self.cancel();
                let _ = reply.send(cancelled);
            }
            SessionCommand::Shutdown => return false,
        }

        true
    }

    fn submit(&mut self, file: Option<FilePayload>, credential: Credential) -> Result<SessionId> {
        if let Some(slot) = &self.slot {
            warn!(active = %slot.session_id, "submit rejected, an upload is already in progress");
            return Err(BeamError::SessionBusy);
        }

        // Delayed effects of the previous session must not touch this one
        self.timers.cancel_all();

        let session_id = SessionId::new();
        self.snapshot = UploadSnapshot {
            session_id: Some(session_id),
            file_name: file.as_ref().map(|file| file.name.clone()),
            file_size: file.as_ref().map(|file| file.size),
            created_at: Some(Utc::now()),
            ..UploadSnapshot::default()
        };

        let file = match validate(file, &credential) {
            Ok(file) => file,
            Err(err) => {
                info!(%session_id, reason = %err, "upload rejected before sending");
                self.finish(Outcome::Failed(err.into()));
                return Ok(session_id);
            }
        };

        info!(%session_id, file = %file.name, size = file.size, "upload submitted");
        self.transition(UploadState::Submitting);
        self.open_transport(session_id, file, credential);

        Ok(session_id)
    }

    fn open_transport(&mut self, session_id: SessionId, file: FilePayload, credential: Credential) {
        let cancellation_token = CancellationToken::new();
        let transport = self.transport.clone();
        let signal_tx = self.signal_tx.clone();

        let progress: ProgressCallback = {
            let signal_tx = signal_tx.clone();
            Arc::new(move |progress: UploadProgress| {
                let _ = signal_tx.send(TransportSignal::new(session_id, TransportEvent::Progress(progress)));
            })
        };

        let token = cancellation_token.clone();
        let join_handle = tokio::spawn(async move {
            let _ = signal_tx.send(TransportSignal::new(session_id, TransportEvent::Opened));

            // Abort wins over a completion that becomes ready at the same time
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => TransportEvent::Aborted,
                result = transport.upload(file, credential, progress) => match result {
                    Ok(response) => TransportEvent::Completed(response),
                    Err(err) => TransportEvent::NetworkError(err.to_string()),
                },
            };

            let _ = signal_tx.send(TransportSignal::new(session_id, event));
        });

        self.slot = Some(TransportSlot {
            session_id,
            cancellation_token,
            join_handle,
        });
    }

    /// Aborts whatever holds the transport slot, including a transfer whose
    /// `Opened` signal has not been processed yet.
    fn cancel(&mut self) -> bool {
        if self.slot.is_none() {
            debug!(state = %self.snapshot.state, "cancel ignored, nothing in flight");
            return false;
        }

        self.finish(Outcome::Cancelled);
        true
    }

    fn handle_signal(&mut self, signal: TransportSignal) {
        let current = self.slot.as_ref().map(|slot| slot.session_id);
        if current != Some(signal.session_id) {
            debug!(session_id = %signal.session_id, event = ?signal.event, "dropping stale transport signal");
            return;
        }

        match reduce(self.snapshot.state, signal.event) {
            Transition::Ignore => {}
            Transition::Enter(state) => self.transition(state),
            Transition::Progress(progress) => {
                self.snapshot.progress = Some(progress);
                self.publish();
                let _ = self.event_tx.send(UploadEvent::Progress {
                    session_id: signal.session_id,
                    progress,
                });
            }
            Transition::Finish(outcome) => self.finish(outcome),
        }
    }

    fn transition(&mut self, new_state: UploadState) {
        let Some(session_id) = self.snapshot.session_id else {
            return;
        };

        let old_state = self.snapshot.state;
        self.snapshot.state = new_state;
        if new_state == UploadState::InFlight {
            let total = self.snapshot.file_size.filter(|size| *size > 0);
            self.snapshot.progress = Some(UploadProgress::new(0, total));
        }

        debug!(%session_id, %old_state, %new_state, "upload state changed");
        self.publish();
        let _ = self.event_tx.send(UploadEvent::StateChanged {
            session_id,
            old_state,
            new_state,
        });
    }

    /// Enters a terminal state and releases the transport slot.
    fn finish(&mut self, outcome: Outcome) {
        if let Some(slot) = self.slot.take() {
            slot.cancellation_token.cancel();
        }

        let Some(session_id) = self.snapshot.session_id else {
            return;
        };

        let old_state = self.snapshot.state;
        let new_state = outcome.state();
        self.snapshot.state = new_state;
        self.snapshot.progress = None;
        self.snapshot.outcome = Some(outcome.clone());
        self.snapshot.finished_at = Some(Utc::now());

        match &outcome {
            Outcome::Succeeded(receipt) => {
                info!(%session_id, stored_as = ?receipt.filename, "upload succeeded");
            }
            other => warn!(%session_id, reason = %other.message(), "upload did not succeed"),
        }

        self.publish();
        let _ = self.event_tx.send(UploadEvent::StateChanged {
            session_id,
            old_state,
            new_state,
        });
        let _ = self.event_tx.send(UploadEvent::Finished {
            session_id,
            outcome: outcome.clone(),
        });

        self.notifications.enqueue(outcome.message(), outcome.severity());
        self.schedule_effects(session_id, &outcome);
    }

    fn schedule_effects(&mut self, session_id: SessionId, outcome: &Outcome) {
        let event_tx = self.event_tx.clone();

        match outcome {
            Outcome::Succeeded(_) => {
                let _ = self.event_tx.send(UploadEvent::FormReset { session_id });
                self.timers.schedule(self.timings.refresh_delay, async move {
                    let _ = event_tx.send(UploadEvent::ListingRefreshDue { session_id });
                    let _ = event_tx.send(UploadEvent::ProgressHidden { session_id });
                });
            }
            // Rejected inputs never showed a progress display
            Outcome::Failed(UploadError::Validation(_)) => {}
            Outcome::Failed(_) | Outcome::Cancelled => {
                self.timers.schedule(self.timings.hide_delay, async move {
                    let _ = event_tx.send(UploadEvent::ProgressHidden { session_id });
                });
            }
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.snapshot.clone());
    }

    fn teardown(&mut self) {
        if let Some(slot) = self.slot.take() {
            debug!(session_id = %slot.session_id, "aborting in-flight upload on shutdown");
            slot.cancellation_token.cancel();
            slot.join_handle.abort();
        }

        self.timers.cancel_all();
    }
}
