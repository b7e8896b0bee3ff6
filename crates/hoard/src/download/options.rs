//! # Download Options
//!
//! Per-request overrides layered over the downloader's configuration.

use reqwest::header::{HeaderMap, HeaderValue};

/// HTTP basic credentials for one request.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Options for a single download operation. Everything here is optional;
/// unset fields fall back to the downloader's configuration.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Additional headers to send with the request, taking precedence
    /// over the client's default headers.
    pub headers: HeaderMap,

    /// User agent override for this request.
    pub user_agent: Option<String>,

    /// Credentials to authenticate the request with.
    pub credentials: Option<Credentials>,
}

impl DownloadOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set the user agent for this request.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set basic credentials for this request.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_empty() {
        let options = DownloadOptions::new();
        assert!(options.headers.is_empty());
        assert!(options.user_agent.is_none());
        assert!(options.credentials.is_none());
    }

    #[test]
    fn test_options_builders() {
        let options = DownloadOptions::new()
            .with_header("X-Request-Id", "42")
            .with_user_agent("Test/1.0")
            .with_credentials("user", "pass");

        assert_eq!(options.headers.get("X-Request-Id").unwrap(), "42");
        assert_eq!(options.user_agent.as_deref(), Some("Test/1.0"));
        let credentials = options.credentials.unwrap();
        assert_eq!(credentials.username, "user");
        assert_eq!(credentials.password, "pass");
    }
}
