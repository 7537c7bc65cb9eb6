// Required external crates for configuration management and serialization
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Configuration for locating the serialized model and tokenizer
#[derive(Debug, Deserialize, Clone)]
pub struct AssetConfig {
    /// Directory where the artifacts are stored
    pub directory: PathBuf,
    /// File name of the model artifact inside the assets directory
    pub model: String,
    /// File name of the tokenizer artifact inside the assets directory
    pub tokenizer: String,
}

/// Configuration for the HTTP server
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Optional log directory
    pub file: Option<PathBuf>,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Asset-related settings
    pub assets: AssetConfig,
    /// Server-related settings
    pub server: ServerConfig,
    /// Logging-related settings
    pub logging: LoggingConfig,
}

/// Implementation for loading and parsing configuration
impl Settings {
    /// Creates a new Settings instance by loading config from multiple sources
    /// in the following order of precedence (highest to lowest):
    /// 1. Environment variables prefixed with STORYQA_
    /// 2. Local config file (local.toml) if present
    /// 3. Default config file (default.toml)
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::current_dir()
            .map_err(|e| ConfigError::Message(
                format!("Failed to get current directory: {}", e)
            ))?
            .join("config");

        if !config_dir.exists() {
            return Err(ConfigError::Message(
                format!("Config directory not found at: {}", config_dir.display())
            ));
        }

        let default_config = config_dir.join("default.toml");
        if !default_config.exists() {
            return Err(ConfigError::Message(
                format!("Default configuration file not found at: {}", default_config.display())
            ));
        }

        let local_config = config_dir.join("local.toml");

        // Convert paths to strings and keep them alive
        let default_config_path = default_config.to_string_lossy();
        let local_config_path = local_config.to_string_lossy();

        let settings = Config::builder()
            .add_source(File::with_name(&default_config_path))
            .add_source(File::with_name(&local_config_path).required(false))
            .add_source(Environment::with_prefix("STORYQA").separator("_"))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;

        Ok(settings)
    }

    /// Full path of the model artifact.
    pub fn model_path(&self) -> PathBuf {
        self.assets.directory.join(&self.assets.model)
    }

    /// Full path of the tokenizer artifact.
    pub fn tokenizer_path(&self) -> PathBuf {
        self.assets.directory.join(&self.assets.tokenizer)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        // The artifacts are produced offline and deployed alongside the
        // service; creating the directory here would only delay the failure
        // to the asset loader.
        if !self.assets.directory.exists() {
            return Err(ConfigError::Message(format!(
                "Assets directory not found at: {}",
                self.assets.directory.display()
            )));
        }

        if self.assets.model.is_empty() {
            return Err(ConfigError::Message(
                "assets.model must not be empty".to_string()
            ));
        }

        if self.assets.tokenizer.is_empty() {
            return Err(ConfigError::Message(
                "assets.tokenizer must not be empty".to_string()
            ));
        }

        // Validate server port range
        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Port must be between 1 and 65535".to_string()
            ));
        }

        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::Message(
                format!("Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                    self.logging.level)
            )),
        }?;

        // Create log file directory if configured and doesn't exist
        if let Some(log_file) = &self.logging.file {
            if !log_file.exists() {
                std::fs::create_dir_all(log_file).map_err(|e| {
                    ConfigError::Message(format!(
                        "Failed to create log directory at {}: {}",
                        log_file.display(), e
                    ))
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings(dir: &std::path::Path) -> Settings {
        Settings {
            assets: AssetConfig {
                directory: dir.to_path_buf(),
                model: "model.sqam".to_string(),
                tokenizer: "tokenizer.json".to_string(),
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: None,
            },
        }
    }

    #[test]
    fn valid_settings_pass_validation() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn missing_assets_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.assets.directory = dir.path().join("does-not-exist");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.logging.level = "verbose".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_port_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn asset_paths_join_directory_and_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        assert_eq!(settings.model_path(), dir.path().join("model.sqam"));
        assert_eq!(settings.tokenizer_path(), dir.path().join("tokenizer.json"));
    }
}
