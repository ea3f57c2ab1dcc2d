//! Configuration management module
//!
//! Handles loading, validation, and management of application configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Trading symbol selected at startup
    pub symbol: String,

    /// Logging level
    pub log_level: String,

    /// File-based logging configuration
    pub log: LogConfig,

    /// Data server configuration
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// REST base URL (candle snapshots and trades)
    pub rest_url: String,

    /// Live stream endpoint URL
    pub ws_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Delay between stream reconnect attempts in milliseconds
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Absolute or relative path to the rolling log file
    pub file_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            log_level: "info".to_string(),
            log: LogConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rest_url: "http://localhost:8000".to_string(),
            ws_url: "ws://localhost:8000/ws/candles".to_string(),
            timeout_seconds: 10,
            reconnect_delay_ms: 3000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_path: "logs/chartfeed.log".to_string(),
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
        // CHARTFEED_SYMBOL - startup symbol
        if let Ok(symbol) = env::var("CHARTFEED_SYMBOL") {
            if !symbol.trim().is_empty() {
                self.symbol = symbol.trim().to_string();
            }
        }

        // CHARTFEED_LOG_LEVEL - logging level
        if let Ok(log_level) = env::var("CHARTFEED_LOG_LEVEL") {
            self.log_level = log_level;
        }

        // CHARTFEED_LOG_FILE_PATH - logging destination file
        if let Ok(file_path) = env::var("CHARTFEED_LOG_FILE_PATH") {
            if !file_path.trim().is_empty() {
                self.log.file_path = file_path;
            }
        }

        // CHARTFEED_REST_URL - REST base URL
        if let Ok(rest_url) = env::var("CHARTFEED_REST_URL") {
            self.server.rest_url = rest_url;
        }

        // CHARTFEED_WS_URL - stream endpoint URL
        if let Ok(ws_url) = env::var("CHARTFEED_WS_URL") {
            self.server.ws_url = ws_url;
        }

        // CHARTFEED_TIMEOUT_SECONDS - request timeout
        if let Ok(timeout) = env::var("CHARTFEED_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.server.timeout_seconds = value;
            }
        }

        // CHARTFEED_RECONNECT_DELAY_MS - reconnect delay
        if let Ok(delay) = env::var("CHARTFEED_RECONNECT_DELAY_MS") {
            if let Ok(value) = delay.parse::<u64>() {
                self.server.reconnect_delay_ms = value;
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
            let mut config = Self::default();
            config.apply_env_overrides();
            config
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.symbol.is_empty() || self.symbol.len() < 3 {
            anyhow::bail!("Invalid symbol format: {}", self.symbol);
        }

        if self.server.timeout_seconds == 0 {
            anyhow::bail!("Timeout must be greater than 0");
        }

        if self.server.reconnect_delay_ms == 0 {
            anyhow::bail!("Reconnect delay must be greater than 0");
        }

        if self.server.rest_url.trim().is_empty() {
            anyhow::bail!("REST URL must not be empty");
        }

        if self.server.ws_url.trim().is_empty() {
            anyhow::bail!("Stream URL must not be empty");
        }

        if self.log.file_path.trim().is_empty() {
            anyhow::bail!("Log file path must not be empty");
        }

        Ok(())
    }

    /// Normalize symbol format for the data server
    pub fn normalize_symbol(symbol: &str) -> String {
        // Convert BTC-USDT to BTCUSDT format
        symbol.replace('-', "").to_uppercase()
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
        println!("  chartfeed config show    - Show current configuration");
        println!("  chartfeed config reset   - Show default configuration");
        Ok(())
    }

    /// Handle configuration command
    pub fn handle_command(action: &Option<crate::cli::ConfigAction>, config_file: &str) -> Result<()> {
        match action {
            Some(crate::cli::ConfigAction::Show) => {
                let config = Config::load_or_default(config_file);
                config.display()?;
            }
            Some(crate::cli::ConfigAction::Reset) => {
                let default_config = Config::default();
                default_config.display()?;
            }
            None => {
                Config::display_help()?;
            }
        }
        Ok(())
    }
}
