mod queue;

pub use queue::{
    NotificationEvent,
    NotificationHandle,
    NotificationId,
    NotificationMessage,
    NotificationQueue,
    Severity,
};
