use serde::Deserialize;
use std::path::Path;

use crate::error::Result;

/// Defaults used when building fake requests and responses.
///
/// Nothing here is read from the environment: a config is built explicitly
/// (via [`Default`] or [`StubConfig::from_file`]) and handed to each fake's
/// constructor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StubConfig {
    /// Scheme prefix used to absolutize relative redirects (`http://`, `https://` or `file:`).
    pub protocol: String,
    pub server_name: String,
    pub server_port: u16,
    pub context_path: String,

    /// Content type every fresh response starts with.
    pub default_content_type: String,
    pub buffer_size: usize,

    /// Append the session id to URLs passed through `encode_url`.
    pub encode_urls: bool,
    pub session_id: Option<String>,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            protocol: "http://".to_string(),
            server_name: "localhost".to_string(),
            server_port: 80,
            context_path: String::new(),

            default_content_type: "text/html".to_string(),
            buffer_size: 1024,

            encode_urls: false,
            session_id: None,
        }
    }
}

impl StubConfig {
    /// Loads a config from a TOML file. Missing keys keep their default value.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config = toml::from_str::<StubConfig>(content)?;
        tracing::debug!(server = %config.server_name, "loaded stub config");
        Ok(config)
    }
}
