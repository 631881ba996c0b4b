use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "filebeam.toml";
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8888";
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// Delays of the cosmetic transitions that follow a finished upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTimings {
    /// Success -> file list reload
    #[serde(rename = "refresh_delay_ms", serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
    pub refresh_delay: Duration,
    /// Failure or cancel -> progress display hidden
    #[serde(rename = "hide_delay_ms", serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
    pub hide_delay: Duration,
    #[serde(rename = "notification_ttl_ms", serialize_with = "serialize_millis", deserialize_with = "deserialize_millis")]
    pub notification_ttl: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            refresh_delay: Duration::from_millis(1000),
            hide_delay: Duration::from_millis(3000),
            notification_ttl: Duration::from_millis(3000),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the FileBeam server
    pub server: String,
    /// Used when no password is given on the command line
    pub password: Option<String>,
    /// Read size for the streamed upload body
    pub chunk_size: usize,
    pub timings: SessionTimings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            password: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timings: SessionTimings::default(),
        }
    }
}

impl ClientConfig {
    /// Reads `path` if it exists, otherwise returns the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&config_str)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(config_str: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(config_str)?;
        config.server_url()?;
        Ok(config)
    }

    pub fn server_url(&self) -> anyhow::Result<Url> {
        let url = Url::parse(&self.server)
            .with_context(|| format!("Invalid server url: {:?}", self.server))?;
        anyhow::ensure!(
            matches!(url.scheme(), "http" | "https"),
            "Server url must be http or https: {}",
            url
        );
        Ok(url)
    }
}
