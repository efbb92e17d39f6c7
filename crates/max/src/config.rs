//! Settings of a Max session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use max_ollama_model::{OllamaConfig, OllamaConfigBuilder, RouteError};

use crate::memory::DEFAULT_MEMORY_WINDOW;

/// Error returned when settings don't make sense.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The project path is missing or not a directory.
    #[error("{} is not a valid directory.", .0.display())]
    NotADirectory(PathBuf),
    /// The model route can't be served locally.
    #[error("invalid model: {0}")]
    Model(#[from] RouteError),
    /// The request timeout is zero.
    #[error("the request timeout must be at least one second")]
    ZeroTimeout,
}

/// Builder for [`Settings`].
#[derive(Clone, Debug, Default)]
pub struct SettingsBuilder {
    project_dir: Option<PathBuf>,
    model: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    memory_window: Option<usize>,
}

impl SettingsBuilder {
    /// Sets the project directory, the current directory by default.
    #[inline]
    pub fn with_project_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.project_dir = Some(path.into());
        self
    }

    /// Sets the model route, e.g. `ollama_chat/gpt-oss:20b`.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the base URL of the model server.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets how many seconds a response may stay silent.
    #[inline]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Sets how many past exchanges are sent with each question.
    #[inline]
    pub fn with_memory_window(mut self, window: usize) -> Self {
        self.memory_window = Some(window);
        self
    }

    /// Validates the settings.
    ///
    /// The project directory is resolved to an absolute path.
    pub fn build(self) -> Result<Settings, ConfigError> {
        let path = self.project_dir.unwrap_or_else(|| PathBuf::from("."));
        let project_dir = match path.canonicalize() {
            Ok(dir) if dir.is_dir() => dir,
            _ => return Err(ConfigError::NotADirectory(path)),
        };

        let mut ollama = OllamaConfigBuilder::default();
        if let Some(model) = self.model {
            ollama = ollama.with_model(model);
        }
        if let Some(base_url) = self.base_url {
            ollama = ollama.with_base_url(base_url);
        }
        if let Some(secs) = self.timeout_secs {
            if secs == 0 {
                return Err(ConfigError::ZeroTimeout);
            }
            ollama = ollama.with_read_timeout(Duration::from_secs(secs));
        }

        Ok(Settings {
            project_dir,
            ollama: ollama.build()?,
            memory_window: self.memory_window.unwrap_or(DEFAULT_MEMORY_WINDOW),
        })
    }
}

/// Validated settings of a session.
#[derive(Clone, Debug)]
pub struct Settings {
    project_dir: PathBuf,
    ollama: OllamaConfig,
    memory_window: usize,
}

impl Settings {
    /// Returns the absolute project directory.
    #[inline]
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Returns the model server configuration.
    #[inline]
    pub fn ollama(&self) -> &OllamaConfig {
        &self.ollama
    }

    /// Returns how many past exchanges are sent with each question.
    #[inline]
    pub fn memory_window(&self) -> usize {
        self.memory_window
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use max_ollama_model::{DEFAULT_BASE_URL, DEFAULT_MODEL_ROUTE};

    use super::*;

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsBuilder::default()
            .with_project_dir(dir.path())
            .build()
            .unwrap();
        assert!(settings.project_dir().is_absolute());
        assert_eq!(settings.ollama().base_url(), DEFAULT_BASE_URL);
        assert_eq!(
            settings.ollama().model(),
            DEFAULT_MODEL_ROUTE.trim_start_matches("ollama_chat/")
        );
        assert_eq!(settings.memory_window(), DEFAULT_MEMORY_WINDOW);
    }

    #[test]
    fn test_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsBuilder::default()
            .with_project_dir(dir.path())
            .with_model("ollama/qwen2.5-coder:7b")
            .with_base_url("http://gpu-box:11434/")
            .with_memory_window(4)
            .build()
            .unwrap();
        assert_eq!(settings.ollama().model(), "qwen2.5-coder:7b");
        assert_eq!(settings.ollama().base_url(), "http://gpu-box:11434");
        assert_eq!(settings.memory_window(), 4);
    }

    #[test]
    fn test_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.rs");
        fs::write(&file, "fn main() {}").unwrap();

        for path in [file, dir.path().join("missing")] {
            let err = SettingsBuilder::default()
                .with_project_dir(&path)
                .build()
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("{} is not a valid directory.", path.display())
            );
        }
    }

    #[test]
    fn test_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let foreign = SettingsBuilder::default()
            .with_project_dir(dir.path())
            .with_model("openai/gpt-4o")
            .build();
        assert!(matches!(
            foreign,
            Err(ConfigError::Model(RouteError::UnsupportedProvider(_)))
        ));

        let zero = SettingsBuilder::default()
            .with_project_dir(dir.path())
            .with_timeout_secs(0)
            .build();
        assert!(matches!(zero, Err(ConfigError::ZeroTimeout)));
    }
}
