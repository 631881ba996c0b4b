use std::fmt;
use std::path::{Path, PathBuf};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use uuid::Uuid;
use super::errors::{BeamError, Result};

/// Identifies one submission. A fresh id is minted on every `submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum UploadState {
    /// No submission yet
    #[default]
    Idle,
    /// Inputs accepted, transport being opened
    Submitting,
    /// Request body is streaming
    InFlight,
    Succeeded,
    Failed,
    Cancelled,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether a session in this state still owns the transport slot.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Submitting | Self::InFlight)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::InFlight => "in flight",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_sent: u64,
    /// `None` when the transport cannot tell how large the body is.
    pub bytes_total: Option<u64>,
}

impl UploadProgress {
    pub fn new(bytes_sent: u64, bytes_total: Option<u64>) -> Self {
        Self { bytes_sent, bytes_total }
    }

    pub fn percentage(&self) -> Option<f64> {
        match self.bytes_total {
            Some(total) if total > 0 => {
                Some((self.bytes_sent.min(total) as f64 / total as f64) * 100.0)
            }
            _ => None,
        }
    }
}

/// Upload password. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Empty and whitespace-only secrets are treated as missing.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Self(secret.to_string())
    }
}

#[derive(Debug, Clone)]
pub enum PayloadSource {
    Memory(Bytes),
    Path(PathBuf),
}

/// The file chosen for upload: a name, a byte size and where to read it from.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub name: String,
    pub size: u64,
    pub source: PayloadSource,
}

impl FilePayload {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            source: PayloadSource::Memory(data),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(BeamError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Not a file: {}", path.display()),
            )));
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| BeamError::internal(format!("No file name in {}", path.display())))?;

        Ok(Self {
            name,
            size: metadata.len(),
            source: PayloadSource::Path(path.to_path_buf()),
        })
    }

    /// Opens the payload as a stream of chunks no larger than `chunk_size`.
    pub async fn into_stream(self, chunk_size: usize) -> std::io::Result<BoxStream<'static, std::io::Result<Bytes>>> {
        let chunk_size = chunk_size.max(1);

        match self.source {
            PayloadSource::Memory(data) => {
                let chunks: Vec<Bytes> = (0..data.len())
                    .step_by(chunk_size)
                    .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
                    .collect();

                Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
            }
            PayloadSource::Path(path) => {
                let file = File::open(&path).await?;
                Ok(ReaderStream::with_capacity(file, chunk_size).boxed())
            }
        }
    }
}

/// Raw result of a completed upload exchange, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, body: body.into() }
    }
}

const _: () = {
    fn assert_send<T: Send>() {}
    fn assert_types() {
        assert_send::<FilePayload>();
        assert_send::<Credential>();
        assert_send::<TransportResponse>();
    }
};
