use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(Uuid);

impl NotificationId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub id: NotificationId,
    pub text: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

/// Returned by `enqueue`; lets the caller dismiss the message early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationHandle {
    id: NotificationId,
}

impl NotificationHandle {
    pub fn id(&self) -> NotificationId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Posted(NotificationMessage),
    Expired(NotificationId),
    Dismissed(NotificationId),
}

struct Entry {
    message: NotificationMessage,
    expires_at: Instant,
}

/// Transient, auto-expiring user messages.
///
/// Entries are kept sorted by expiry. Reads drop anything whose deadline has
/// passed, so a message is visible strictly before `created + ttl` and gone
/// from then on, whether or not its expiry task has run yet. Each message is
/// removed at most once; only the removal that actually happens is broadcast.
#[derive(Clone)]
pub struct NotificationQueue {
    entries: Arc<Mutex<Vec<Entry>>>,
    ttl: Duration,
    event_tx: broadcast::Sender<NotificationEvent>,
    shutdown: Arc<Mutex<CancellationToken>>,
}

impl NotificationQueue {
    pub const DEFAULT_TTL: Duration = Duration::from_millis(3000);

    pub fn new(ttl: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(64);

        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            ttl,
            event_tx,
            shutdown: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn enqueue(&self, text: impl Into<String>, severity: Severity) -> NotificationHandle {
        let message = NotificationMessage {
            id: NotificationId::new(),
            text: text.into(),
            severity,
            created_at: Utc::now(),
            ttl: self.ttl,
        };
        let id = message.id;
        let expires_at = Instant::now() + self.ttl;

        {
            let mut entries = self.entries.lock();
            let position = entries.partition_point(|entry| entry.expires_at <= expires_at);
            entries.insert(position, Entry { message: message.clone(), expires_at });
        }

        debug!(%id, ?severity, text = %message.text, "notification posted");
        let _ = self.event_tx.send(NotificationEvent::Posted(message));
        self.schedule_expiry(expires_at);

        NotificationHandle { id }
    }

    /// Removes a message before its ttl. Returns `false` if it was already gone.
    pub fn dismiss(&self, handle: &NotificationHandle) -> bool {
        let removed = {
            let mut entries = self.entries.lock();
            match entries.iter().position(|entry| entry.message.id == handle.id) {
                Some(index) => {
                    entries.remove(index);
                    true
                }
                None => false,
            }
        };

        if removed {
            let _ = self.event_tx.send(NotificationEvent::Dismissed(handle.id));
        }

        removed
    }

    /// Live messages, soonest to expire first.
    pub fn active(&self) -> Vec<NotificationMessage> {
        self.prune_expired();
        self.entries.lock().iter().map(|entry| entry.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.prune_expired();
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.event_tx.subscribe()
    }

    /// Cancels all pending expiry tasks and drops every message.
    ///
    /// The queue stays usable; later messages get fresh expiry tasks.
    pub fn close(&self) {
        {
            let mut shutdown = self.shutdown.lock();
            shutdown.cancel();
            *shutdown = CancellationToken::new();
        }
        self.entries.lock().clear();
    }

    fn prune_expired(&self) {
        let now = Instant::now();
        let expired: Vec<NotificationId> = {
            let mut entries = self.entries.lock();
            let split = entries.partition_point(|entry| entry.expires_at <= now);
            entries.drain(..split).map(|entry| entry.message.id).collect()
        };

        for id in expired {
            debug!(%id, "notification expired");
            let _ = self.event_tx.send(NotificationEvent::Expired(id));
        }
    }

    fn schedule_expiry(&self, expires_at: Instant) {
        // Outside a runtime expiry still happens lazily on the next read.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let queue = self.clone();
        let token = self.shutdown.lock().child_token();
        runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep_until(expires_at) => queue.prune_expired(),
            }
        });
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

impl fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationQueue")
            .field("ttl", &self.ttl)
            .field("pending", &self.entries.lock().len())
            .finish()
    }
}
