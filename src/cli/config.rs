// ABOUTME: Configuration management for pipeline binaries
// ABOUTME: Handles loading configuration from files and environment variables

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// State URI; defaults to a per-build file under the temp dir.
    #[serde(default)]
    pub state: Option<String>,

    #[serde(default = "default_batch_timeout", with = "humantime_serde")]
    pub batch_timeout: Duration,

    #[serde(default)]
    pub max_concurrent: Option<usize>,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Argument values; `--arg` on the command line wins.
    #[serde(default)]
    pub args: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_batch_timeout() -> Duration {
    Duration::from_secs(3600)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state: None,
            batch_timeout: default_batch_timeout(),
            max_concurrent: None,
            logging: LoggingConfig::default(),
            args: HashMap::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => Some(p),
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                serde_yaml::from_str(&contents)?
            }
            _ => Config::default(),
        };

        config.merge_env()?;
        Ok(config)
    }

    /// State URI for a build, falling back to `<tmp>/trellis/<build-id>/state.json`.
    pub fn state_uri(&self, build_id: &str) -> String {
        match &self.state {
            Some(uri) => uri.clone(),
            None => std::env::temp_dir()
                .join("trellis")
                .join(build_id)
                .join("state.json")
                .to_string_lossy()
                .into_owned(),
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let possible_paths = [
            PathBuf::from("trellis.yaml"),
            PathBuf::from("trellis.yml"),
            PathBuf::from(".trellis.yaml"),
            PathBuf::from(".trellis.yml"),
        ];

        // Check current directory
        if let Some(path) = possible_paths.into_iter().find(|path| path.exists()) {
            return Some(path);
        }

        // Check home directory
        dirs::home_dir()
            .map(|home| home.join(".trellis").join("config.yaml"))
            .filter(|path| path.exists())
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(state) = std::env::var("TRELLIS_STATE") {
            self.state = Some(state);
        }
        if let Ok(timeout) = std::env::var("TRELLIS_BATCH_TIMEOUT") {
            self.batch_timeout = humantime_serde::re::humantime::parse_duration(&timeout)?;
        }
        if let Ok(level) = std::env::var("TRELLIS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TRELLIS_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }
}
