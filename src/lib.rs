pub mod client;
pub mod config;
pub mod core;
pub mod listing;
pub mod notify;
pub mod upload;
pub mod utils;

pub use client::BeamClient;
pub use config::{ClientConfig, SessionTimings};
pub use crate::core::{
    BeamError,
    Credential,
    FilePayload,
    Result,
    SessionId,
    TransportResponse,
    UploadProgress,
    UploadState,
    UploadTransport,
};
pub use listing::{FileEntry, FileListLoader, FileListing, ListingError};
pub use notify::{NotificationEvent, NotificationQueue, Severity};
pub use upload::{
    HttpUploadTransport,
    Outcome,
    UploadError,
    UploadEvent,
    UploadSession,
    UploadSnapshot,
};

#[cfg(test)]
mod tests;
