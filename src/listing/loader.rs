use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use crate::core::BeamError;

/// Any of these means "the list could not be loaded", as opposed to an empty list.
#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Malformed file list: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One shared file as the server describes it. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub size_human: String,
    #[serde(default)]
    pub modified: Option<DateTime<FixedOffset>>,
    pub modified_str: String,
    /// Server-relative, resolve with `FileListLoader::resolve`
    pub download_url: String,
    pub info_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileListing {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub total_size: Option<u64>,
    #[serde(default)]
    pub total_size_human: Option<String>,
}

impl FileListing {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

// The server encodes an empty directory as `"files": null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<FileEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<FileEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fetches `GET /api/files`. Independent of any upload; may run concurrently with one.
#[derive(Debug, Clone)]
pub struct FileListLoader {
    client: Client,
    base_url: Url,
    listing_url: Url,
}

impl FileListLoader {
    pub fn new(base_url: Url) -> Result<Self, BeamError> {
        let client = Client::builder().build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: Url) -> Result<Self, BeamError> {
        let listing_url = base_url.join("/api/files")?;

        Ok(Self {
            client,
            base_url,
            listing_url,
        })
    }

    pub async fn load(&self) -> Result<FileListing, ListingError> {
        let response = self.client.get(self.listing_url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.listing_url, %status, "file list request failed");
            return Err(ListingError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let listing: FileListing = serde_json::from_slice(&body)?;

        debug!(files = listing.files.len(), "file list loaded");
        Ok(listing)
    }

    /// Turns a server-relative link from a `FileEntry` into an absolute URL.
    pub fn resolve(&self, link: &str) -> Result<Url, BeamError> {
        Ok(self.base_url.join(link)?)
    }
}
