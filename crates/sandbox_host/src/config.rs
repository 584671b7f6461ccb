//! Host configuration and the TOML-backed config loader.

use std::{
    fs, io,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Acknowledgement shown when an agent reply carried only an app or a script.
pub const DEFAULT_ACKNOWLEDGEMENT: &str = "I have performed the requested action in the sandbox.";
/// Class a bare markup fragment's root must carry to be recognized as an app.
pub const DEFAULT_APP_MARKER_CLASS: &str = "ai-app-window";
/// Storage key for installed app definitions.
pub const INSTALLED_APPS_KEY: &str = "sandbox.installed_apps";
/// Storage key for the conversation transcript.
pub const TRANSCRIPT_KEY: &str = "conversation.history";

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid host config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub default_acknowledgement: String,
    pub app_marker_class: String,
    pub apps_key: String,
    pub transcript_key: String,
    /// Oldest transcript entries are dropped beyond this many.
    pub max_transcript: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            default_acknowledgement: DEFAULT_ACKNOWLEDGEMENT.to_string(),
            app_marker_class: DEFAULT_APP_MARKER_CLASS.to_string(),
            apps_key: INSTALLED_APPS_KEY.to_string(),
            transcript_key: TRANSCRIPT_KEY.to_string(),
            max_transcript: 200,
        }
    }
}

impl HostConfig {
    /// Checks values the extractor and session rely on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty marker class, empty storage keys or a
    /// zero transcript limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_marker_class.trim().is_empty() {
            return Err(ConfigError::Invalid("app_marker_class must not be empty".into()));
        }
        if self.apps_key.is_empty() || self.transcript_key.is_empty() {
            return Err(ConfigError::Invalid("storage keys must not be empty".into()));
        }
        if self.apps_key == self.transcript_key {
            return Err(ConfigError::Invalid(
                "apps_key and transcript_key must differ".into(),
            ));
        }
        if self.max_transcript == 0 {
            return Err(ConfigError::Invalid("max_transcript must be positive".into()));
        }
        Ok(())
    }
}

/// Generic TOML-backed config loader.
///
/// Only filesystem access and deserialization happen here; callers validate the loaded value.
#[derive(Clone, Debug)]
pub struct ConfigLoader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> ConfigLoader<T>
where
    T: DeserializeOwned,
{
    /// Creates a loader for `relative_path` under `root`.
    pub fn new(root: &Path, relative_path: &str) -> Self {
        Self {
            path: root.join(relative_path),
            _marker: PhantomData,
        }
    }

    /// Loads and deserializes the configuration file.
    ///
    /// # Errors
    ///
    /// Missing or unreadable files surface as [`ConfigError::Read`], TOML failures as
    /// [`ConfigError::Parse`].
    pub fn load(&self) -> Result<T, ConfigError> {
        let body = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        toml::from_str(&body).map_err(|source| ConfigError::Parse {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> ConfigLoader<T>
where
    T: DeserializeOwned + Default,
{
    /// Like [`ConfigLoader::load`], but a missing file yields `T::default()`.
    ///
    /// # Errors
    ///
    /// Unreadable files and parse failures are still reported.
    pub fn load_or_default(&self) -> Result<T, ConfigError> {
        match self.load() {
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "config file absent; using defaults");
                Ok(T::default())
            }
            other => other,
        }
    }
}
