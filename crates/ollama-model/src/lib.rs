//! A model provider for a locally hosted Ollama server.
//!
//! The provider doubles as the routing shim: it accepts routed model names
//! such as `ollama_chat/gpt-oss:20b` and speaks the server's native chat
//! endpoint, so agents only ever see the uniform [`ModelProvider`] API.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;
mod route;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use max_model::{ErrorKind, ModelProvider, ModelProviderError, ModelRequest};
use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};

pub use config::{
    BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL_ROUTE, OllamaConfig,
    OllamaConfigBuilder,
};
use io::{Chunks, Lines};
pub use proto::ModelTag;
use proto::{ErrorBody, TagList};
pub use response::OllamaResponse;
pub use route::{ModelRoute, RouteError};

/// Error type for [`OllamaProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_connect() {
            ErrorKind::Unreachable
        } else if err.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Other
        };
        Self::new(format!("{err}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Model provider backed by a local Ollama server.
#[derive(Clone, Debug)]
pub struct OllamaProvider {
    client: Client,
    config: Arc<OllamaConfig>,
}

impl OllamaProvider {
    /// Creates a new `OllamaProvider` with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(|err| Error::from_reqwest(&err))?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Returns the configuration of this provider.
    #[inline]
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Lists the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<ModelTag>, Error> {
        let resp = self
            .client
            .get(self.config.endpoint("/api/tags"))
            .send()
            .await
            .map_err(|err| Error::from_reqwest(&err))?;
        let resp = check_status(resp).await?;
        let tags: TagList = resp
            .json()
            .await
            .map_err(|err| Error::from_reqwest(&err))?;
        debug!("server has {} models installed", tags.models.len());
        Ok(tags.models)
    }

    /// Checks whether the configured model is installed on the server.
    pub async fn has_model(&self) -> Result<bool, Error> {
        let models = self.list_models().await?;
        Ok(models
            .iter()
            .any(|tag| tag_matches(&tag.name, self.config.model())))
    }
}

impl ModelProvider for OllamaProvider {
    type Error = Error;
    type Response = OllamaResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let chat_req = proto::create_request(req, &self.config);
        let resp_fut = self
            .client
            .post(self.config.endpoint("/api/chat"))
            .header(header::ACCEPT, "application/x-ndjson")
            .json(&chat_req)
            .send();

        async move {
            let resp = resp_fut.await.map_err(|err| Error::from_reqwest(&err))?;
            let resp = check_status(resp).await?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_valid_content_type = content_type
                .map(|v| {
                    v.parse()
                        .map(|m: Mime| {
                            matches!(m.subtype().as_str(), "x-ndjson" | "json")
                        })
                        .unwrap_or(false)
                })
                .unwrap_or(true);
            if !is_valid_content_type {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            let lines = Lines::new(Chunks::from_response(resp));
            Ok(OllamaResponse::from_lines(lines))
        }
    }
}

async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ErrorKind::Timeout
        }
        _ => ErrorKind::Other,
    };
    let body = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(body) => body.error,
        Err(_) if !body.trim().is_empty() => body,
        Err(_) => format!("server responded with {status}"),
    };
    warn!("request failed with {status}: {message}");
    Err(Error::new(message, kind))
}

// `llama3.2` is stored as `llama3.2:latest`.
fn tag_matches(tag: &str, model: &str) -> bool {
    if tag == model {
        return true;
    }
    !model.contains(':') && tag.strip_suffix(":latest") == Some(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_matches() {
        assert!(tag_matches("gpt-oss:20b", "gpt-oss:20b"));
        assert!(tag_matches("llama3.2:latest", "llama3.2"));
        assert!(!tag_matches("llama3.2:1b", "llama3.2"));
        assert!(!tag_matches("llama3.2:latest", "llama3.2:1b"));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Nothing listens on the discard port of localhost.
        let config = OllamaConfigBuilder::default()
            .with_base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        let provider = OllamaProvider::new(config).unwrap();
        let err = provider.list_models().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unreachable);
    }
}
