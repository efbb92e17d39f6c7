use std::fmt::{self, Display};
use std::str::FromStr;

/// A model name in `provider/model` form, as accepted by the routing layer.
///
/// Only routes that end up on a local Ollama server are understood:
/// `ollama_chat/<model>`, `ollama/<model>` and a bare `<model>`. Any other
/// `<provider>/` prefix is rejected, except for namespaced Ollama tags: the
/// first segment is a registry host (`hf.co/user/repo`) or the tag is pinned
/// with `:` (`library/llama3:8b`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelRoute {
    model: String,
}

impl ModelRoute {
    /// Returns the model name to send to the server.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Error returned when a model route can't be served locally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteError {
    /// The route has no model name.
    Empty,
    /// The route names a provider other than Ollama.
    UnsupportedProvider(String),
}

impl Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Empty => write!(f, "model name is empty"),
            RouteError::UnsupportedProvider(provider) => write!(
                f,
                "provider `{provider}` is not served by the local model \
                 server, use `ollama_chat/<model>`"
            ),
        }
    }
}

impl std::error::Error for RouteError {}

const LOCAL_PREFIXES: &[&str] = &["ollama_chat", "ollama"];

fn is_namespaced_tag(prefix: &str, rest: &str) -> bool {
    prefix.contains('.') || rest.contains(':')
}

impl FromStr for ModelRoute {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let model = match s.split_once('/') {
            Some((prefix, rest)) if LOCAL_PREFIXES.contains(&prefix) => rest,
            Some((prefix, rest)) if !is_namespaced_tag(prefix, rest) => {
                return Err(RouteError::UnsupportedProvider(prefix.to_owned()));
            }
            _ => s,
        };
        if model.is_empty() {
            return Err(RouteError::Empty);
        }
        Ok(ModelRoute {
            model: model.to_owned(),
        })
    }
}

impl Display for ModelRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ollama_chat/{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_routes() {
        let route: ModelRoute = "ollama_chat/gpt-oss:20b".parse().unwrap();
        assert_eq!(route.model(), "gpt-oss:20b");

        let route: ModelRoute = "ollama/llama3.2".parse().unwrap();
        assert_eq!(route.model(), "llama3.2");

        let route: ModelRoute = " qwen3:8b ".parse().unwrap();
        assert_eq!(route.model(), "qwen3:8b");
        assert_eq!(route.to_string(), "ollama_chat/qwen3:8b");

        // Namespaced tags are not provider prefixes.
        let route: ModelRoute = "library/llama3:8b".parse().unwrap();
        assert_eq!(route.model(), "library/llama3:8b");

        let route: ModelRoute = "hf.co/bartowski/Llama-3.2-1B-Instruct-GGUF"
            .parse()
            .unwrap();
        assert_eq!(route.model(), "hf.co/bartowski/Llama-3.2-1B-Instruct-GGUF");

        let route: ModelRoute = "ollama_chat/library/llama3:8b".parse().unwrap();
        assert_eq!(route.model(), "library/llama3:8b");
    }

    #[test]
    fn test_rejected_routes() {
        assert_eq!(
            "openai/gpt-4o".parse::<ModelRoute>(),
            Err(RouteError::UnsupportedProvider("openai".to_owned()))
        );
        // Unknown providers are rejected too, not only well-known ones.
        assert_eq!(
            "cohere/command-r".parse::<ModelRoute>(),
            Err(RouteError::UnsupportedProvider("cohere".to_owned()))
        );
        assert_eq!(
            "xai/grok-2".parse::<ModelRoute>(),
            Err(RouteError::UnsupportedProvider("xai".to_owned()))
        );
        assert_eq!("ollama_chat/".parse::<ModelRoute>(), Err(RouteError::Empty));
        assert_eq!("".parse::<ModelRoute>(), Err(RouteError::Empty));
    }
}
