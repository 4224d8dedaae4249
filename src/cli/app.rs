// ABOUTME: Main application orchestration for pipeline binaries
// ABOUTME: Coordinates between CLI arguments, configuration, logging and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Config};
use crate::pipeline::Pipeline;

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let installed = match self.config.logging.format.as_str() {
            "compact" => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .try_init(),
            _ => tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .try_init(),
        };

        if installed.is_err() {
            debug!("Logging was already initialized");
        }
        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&self, args: Args, pipelines: Vec<Pipeline>) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting trellis v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::Run(run) => commands::run(&self.config, run, pipelines).await,
            Commands::Plan => commands::plan(pipelines).await,
        }
    }

    /// Create application from command line arguments
    pub fn from_args() -> Result<(Self, Args)> {
        let args = Args::parse_args();
        let config = Config::load(args.config.clone())?;
        Ok((Self::new(config), args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_app_creation() {
        let app = App::new(Config::default());
        assert_eq!(app.config().logging.format, "pretty");
    }

    #[tokio::test]
    async fn test_app_with_config_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("trellis.yaml");

        let config_content = r#"
logging:
  level: debug
  format: compact
"#;
        fs::write(&config_path, config_content).unwrap();

        let app = App::new(Config::load(Some(config_path)).unwrap());
        assert_eq!(app.config().logging.level, "debug");
        assert_eq!(app.config().logging.format, "compact");
    }
}
