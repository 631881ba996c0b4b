use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use tracing::debug;
use url::Url;
use crate::core::{
    Credential,
    FilePayload,
    ProgressCallback,
    Result,
    TransportResponse,
    UploadTransport,
};
use super::progress_stream::ProgressStream;

/// Multipart `POST /upload` over reqwest.
///
/// The file is streamed, never buffered whole. No timeout is applied; a slow
/// transfer only ends by completing, failing, or being cancelled.
#[derive(Debug, Clone)]
pub struct HttpUploadTransport {
    client: Client,
    upload_url: Url,
    chunk_size: usize,
}

impl HttpUploadTransport {
    pub fn new(server: &Url, chunk_size: usize) -> Result<Self> {
        let client = Client::builder().build()?;
        Self::with_client(client, server, chunk_size)
    }

    pub fn with_client(client: Client, server: &Url, chunk_size: usize) -> Result<Self> {
        Ok(Self {
            client,
            upload_url: server.join("/upload")?,
            chunk_size,
        })
    }

    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }
}

#[async_trait]
impl UploadTransport for HttpUploadTransport {
    async fn upload(
        &self,
        file: FilePayload,
        credential: Credential,
        progress: ProgressCallback,
    ) -> Result<TransportResponse> {
        let file_name = file.name.clone();
        let file_size = file.size;
        let bytes_total = (file_size > 0).then_some(file_size);

        let stream = file.into_stream(self.chunk_size).await?;
        let body = Body::wrap_stream(ProgressStream::new(stream, progress, bytes_total));

        let part = Part::stream_with_length(body, file_size)
            .file_name(file_name.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .part("file", part)
            .text("password", credential.expose().to_string());

        debug!(url = %self.upload_url, file = %file_name, size = file_size, "sending upload request");

        let response = self
            .client
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;

        debug!(status, body_len = body.len(), "upload response received");

        Ok(TransportResponse { status, body })
    }
}
