use std::sync::Arc;
use async_trait::async_trait;
use super::errors::Result;
use super::types::{Credential, FilePayload, TransportResponse, UploadProgress};

/// Receives byte counts while a request body is being sent.
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Performs the actual upload exchange.
///
/// Implementations only move bytes: they do not classify responses and they
/// do not need to handle aborts. The session races every call against its
/// cancellation token and drops the future when the user cancels.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Sends `file` with `credential` and returns the raw status and body.
    ///
    /// An `Err` means no response was received and is reported to the user
    /// as a network error.
    async fn upload(
        &self,
        file: FilePayload,
        credential: Credential,
        progress: ProgressCallback,
    ) -> Result<TransportResponse>;
}
