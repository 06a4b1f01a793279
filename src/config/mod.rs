//! Configuration management module
//!
//! Handles loading, validation, and management of application configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Logging level
    pub log_level: String,

    /// File-based logging configuration
    pub log: LogConfig,

    /// Execution service endpoints
    pub service: ServiceConfig,

    /// Per-session execution limits
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// WebSocket endpoint for interactive sessions
    pub ws_url: String,

    /// HTTP base URL for batch execution
    pub http_url: String,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wall-clock limit for the run stage, in milliseconds
    pub run_timeout_ms: u64,

    /// Wall-clock limit for the compile stage, in milliseconds
    pub compile_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Absolute or relative path to the rolling log file
    pub file_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log: LogConfig::default(),
            service: ServiceConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8080/ws/execute".to_string(),
            http_url: "http://localhost:8080".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        // 30s is the service maximum for both stages.
        Self {
            run_timeout_ms: 30000,
            compile_timeout_ms: 30000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_path: "logs/execwire.log".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        // EXECWIRE_WS_URL - interactive session endpoint
        if let Ok(ws_url) = env::var("EXECWIRE_WS_URL") {
            self.service.ws_url = ws_url;
        }

        // EXECWIRE_HTTP_URL - batch execution base URL
        if let Ok(http_url) = env::var("EXECWIRE_HTTP_URL") {
            self.service.http_url = http_url;
        }

        // EXECWIRE_CONNECT_TIMEOUT_SECS - connection timeout
        if let Ok(timeout) = env::var("EXECWIRE_CONNECT_TIMEOUT_SECS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.service.connect_timeout_secs = value;
            }
        }

        // EXECWIRE_RUN_TIMEOUT_MS - run stage limit
        if let Ok(timeout) = env::var("EXECWIRE_RUN_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.session.run_timeout_ms = value;
            }
        }

        // EXECWIRE_COMPILE_TIMEOUT_MS - compile stage limit
        if let Ok(timeout) = env::var("EXECWIRE_COMPILE_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.session.compile_timeout_ms = value;
            }
        }

        // EXECWIRE_LOG_LEVEL - logging level
        if let Ok(log_level) = env::var("EXECWIRE_LOG_LEVEL") {
            self.log_level = log_level;
        }

        // EXECWIRE_LOG_FILE_PATH - logging destination file
        if let Ok(file_path) = env::var("EXECWIRE_LOG_FILE_PATH") {
            if !file_path.trim().is_empty() {
                self.log.file_path = file_path;
            }
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(path).unwrap_or_else(|err| {
            tracing::warn!("Failed to load config: {}, using defaults", err);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.service.ws_url.starts_with("ws://") && !self.service.ws_url.starts_with("wss://") {
            anyhow::bail!("service.ws_url must use the ws:// or wss:// scheme");
        }

        if !self.service.http_url.starts_with("http://")
            && !self.service.http_url.starts_with("https://")
        {
            anyhow::bail!("service.http_url must use the http:// or https:// scheme");
        }

        if self.service.connect_timeout_secs == 0 {
            anyhow::bail!("Connection timeout must be greater than 0");
        }

        if self.session.run_timeout_ms == 0 {
            anyhow::bail!("Run timeout must be greater than 0");
        }

        if self.session.compile_timeout_ms == 0 {
            anyhow::bail!("Compile timeout must be greater than 0");
        }

        if self.log.file_path.trim().is_empty() {
            anyhow::bail!("Log file path must not be empty");
        }

        Ok(())
    }

    /// Set a single value by its TOML key path
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "log_level" => self.log_level = value.to_string(),
            "log.file_path" => self.log.file_path = value.to_string(),
            "service.ws_url" => self.service.ws_url = value.to_string(),
            "service.http_url" => self.service.http_url = value.to_string(),
            "service.connect_timeout_secs" => {
                self.service.connect_timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid value for {}: {}", key, value))?;
            }
            "session.run_timeout_ms" => {
                self.session.run_timeout_ms = value
                    .parse()
                    .with_context(|| format!("Invalid value for {}: {}", key, value))?;
            }
            "session.compile_timeout_ms" => {
                self.session.compile_timeout_ms = value
                    .parse()
                    .with_context(|| format!("Invalid value for {}: {}", key, value))?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        self.validate()
    }

    /// Display formatted configuration
    pub fn display(&self) -> Result<()> {
        println!("Current configuration:");
        println!("{:#?}", self);
        Ok(())
    }

    /// Display configuration management help
    pub fn display_help() -> Result<()> {
        println!("Configuration management commands:");
        println!("  execwire config show    - Show current configuration");
        println!("  execwire config set <key> <value> - Set configuration value");
        println!("  execwire config reset   - Reset to default configuration");
        Ok(())
    }

    /// Handle configuration command
    pub fn handle_command(action: &Option<crate::cli::ConfigAction>, path: &str) -> Result<()> {
        match action {
            Some(crate::cli::ConfigAction::Show) => {
                let config = Config::load_or_default(path);
                config.display()?;
            }
            Some(crate::cli::ConfigAction::Set { key, value }) => {
                let mut config = Config::load_or_default(path);
                config.set_value(key, value)?;
                config.save_to_file(path)?;
                println!("Set {} = {}", key, value);
            }
            Some(crate::cli::ConfigAction::Reset) => {
                let default_config = Config::default();
                default_config.save_to_file(path)?;
                println!("Configuration reset to defaults");
                default_config.display()?;
            }
            None => {
                Config::display_help()?;
            }
        }
        Ok(())
    }
}
