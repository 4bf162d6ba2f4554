//! Client configuration shared by every transport.

use std::time::Duration;

use url::Url;
use uuid::Uuid;

/// Default API root used when none is configured.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/";
/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Header carrying the per-process request id.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Settings for the HTTP collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root; always ends with `/` so relative joins stay underneath it.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Value sent in the `x-request-id` header.
    pub request_id: String,
}

impl ClientConfig {
    /// Build a configuration for `base_url` with default timeout.
    #[must_use]
    pub fn new(base_url: Url, request_id: impl Into<String>) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            request_id: request_id.into(),
        }
    }

    /// API root with a guaranteed trailing slash.
    #[must_use]
    pub fn normalized_base_url(&self) -> Url {
        with_trailing_slash(self.base_url.clone())
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let base_url = Url::parse(DEFAULT_API_URL).unwrap_or_else(|_| {
            unreachable!("default API URL is a valid absolute URL")
        });
        Self::new(base_url, Uuid::new_v4().to_string())
    }
}

/// Parse an API root, normalising the trailing slash.
///
/// # Errors
///
/// Returns a message naming the input when it is not an absolute URL.
pub fn parse_base_url(input: &str) -> Result<Url, String> {
    input
        .trim()
        .parse::<Url>()
        .map(with_trailing_slash)
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
