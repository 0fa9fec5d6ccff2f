//! Client configuration supplied by the caller.

use std::time::Duration;

use crate::error::ApiError;
use crate::http::Headers;

/// Settings shared by the declarative client and both helpers.
///
/// `timeout` bounds a whole exchange and is enforced by the transport.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub default_headers: Headers,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.append(name, value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve a call URL: absolute URLs pass through, `/path` is joined onto
    /// the base URL.
    pub fn resolve_url(&self, url: &str) -> Result<String, ApiError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }
        match (&self.base_url, url.starts_with('/')) {
            (Some(base), true) => Ok(format!("{base}{url}")),
            (None, true) => Err(ApiError::Construction(format!(
                "relative url {url} needs a base url"
            ))),
            _ => Err(ApiError::Construction(format!("unsupported url {url:?}"))),
        }
    }
}
