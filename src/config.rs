use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{gemini, AuditError, Result};

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// File holding the persisted note collection
    pub data_file: PathBuf,

    /// Base URL of the analysis service
    pub api_base: String,

    /// Gemini model used for analysis
    pub model: String,

    /// API key for the analysis service; absent when unconfigured
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Config {
    /// Resolves configuration from the platform data directory and the
    /// environment.
    ///
    /// `GEMINI_API_KEY` supplies the key, `GEMINI_MODEL` and
    /// `GEMINI_API_BASE` override the service defaults.
    pub fn load() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "code-notes-auditor").ok_or_else(|| {
            AuditError::ConfigError {
                message: "Could not determine a data directory for this platform.".to_string(),
            }
        })?;

        Ok(Self {
            data_file: dirs.data_dir().join("notes.json"),
            api_base: std::env::var("GEMINI_API_BASE")
                .unwrap_or_else(|_| gemini::DEFAULT_API_BASE.to_string()),
            model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| gemini::DEFAULT_MODEL.to_string()),
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
        })
    }

    /// Same resolution, but with the note collection stored at an explicit
    /// path.
    pub fn with_data_file(data_file: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.data_file = data_file;
        Ok(config)
    }
}
