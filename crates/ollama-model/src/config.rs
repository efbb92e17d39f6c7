use std::time::Duration;

use crate::route::{ModelRoute, RouteError};

/// Environment variable the `max` command reads the base URL from.
pub const BASE_URL_ENV: &str = "OLLAMA_API_BASE";

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Model route used when nothing else is configured.
pub const DEFAULT_MODEL_ROUTE: &str = "ollama_chat/gpt-oss:20b";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Builder for [`OllamaConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OllamaConfigBuilder {
    model: Option<String>,
    base_url: Option<String>,
    read_timeout: Option<Duration>,
}

impl OllamaConfigBuilder {
    /// Sets the model route, e.g. `ollama_chat/gpt-oss:20b`.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets how long a response may stay silent before it times out.
    #[inline]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<OllamaConfig, RouteError> {
        let route: ModelRoute = self
            .model
            .as_deref()
            .unwrap_or(DEFAULT_MODEL_ROUTE)
            .parse()?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        Ok(OllamaConfig {
            route,
            base_url,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT),
        })
    }
}

/// Configuration for [`crate::OllamaProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OllamaConfig {
    pub(crate) route: ModelRoute,
    pub(crate) base_url: String,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
}

impl OllamaConfig {
    /// Returns the model name sent to the server.
    #[inline]
    pub fn model(&self) -> &str {
        self.route.model()
    }

    /// Returns the base URL of the server, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[inline]
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
