use std::sync::Arc;
use reqwest::Client;
use crate::config::{ClientConfig, SessionTimings};
use crate::core::{BeamError, Result, UploadTransport};
use crate::listing::FileListLoader;
use crate::notify::NotificationQueue;
use crate::upload::{HttpUploadTransport, UploadSession, UploadSessionHandle};

/// Everything a view needs, built once per run and passed around explicitly.
pub struct BeamClient {
    session: UploadSessionHandle,
    pub listing: FileListLoader,
    pub notifications: NotificationQueue,
}

impl BeamClient {
    /// Wires the HTTP transport and loader against `config.server`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let server = config
            .server_url()
            .map_err(|err| BeamError::internal(format!("{:#}", err)))?;

        let http = Client::builder().build()?;
        let transport = HttpUploadTransport::with_client(http.clone(), &server, config.chunk_size)?;
        let listing = FileListLoader::with_client(http, server)?;

        Ok(Self::with_transport(config.timings, Arc::new(transport), listing))
    }

    pub fn with_transport(
        timings: SessionTimings,
        transport: Arc<dyn UploadTransport>,
        listing: FileListLoader,
    ) -> Self {
        let notifications = NotificationQueue::new(timings.notification_ttl);
        let session = UploadSession::new(transport, notifications.clone(), timings);

        Self {
            session,
            listing,
            notifications,
        }
    }

    pub fn uploads(&self) -> &UploadSession {
        &self.session.session
    }

    /// Tears down the session worker and every pending timer.
    pub async fn shutdown(self) -> Result<()> {
        self.notifications.close();
        self.session.shutdown().await
    }
}
