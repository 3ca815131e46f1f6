//! Configuration module for the protocol servers.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::protocols::Protocol;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "tcp-protocols")]
#[command(author = "tcp-protocols authors")]
#[command(version = "0.1.0")]
#[command(about = "Echo, prime and price-average TCP servers", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address for the echo service (empty string disables it)
    #[arg(long)]
    pub echo: Option<String>,

    /// Address for the prime service (empty string disables it)
    #[arg(long)]
    pub prime: Option<String>,

    /// Address for the price-average service (empty string disables it)
    #[arg(long)]
    pub means: Option<String>,

    /// Maximum number of concurrent connections across all services
    #[arg(short = 'n', long)]
    pub max_connections: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_echo")]
    pub echo: String,
    #[serde(default = "default_prime")]
    pub prime: String,
    #[serde(default = "default_means")]
    pub means: String,
    /// Connection cap shared by every listener
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            echo: default_echo(),
            prime: default_prime(),
            means: default_means(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_echo() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_prime() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_means() -> String {
    "0.0.0.0:8082".to_string()
}

fn default_max_connections() -> usize {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub echo: String,
    pub prime: String,
    pub means: String,
    pub max_connections: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            echo: cli.echo.unwrap_or(toml_config.server.echo),
            prime: cli.prime.unwrap_or(toml_config.server.prime),
            means: cli.means.unwrap_or(toml_config.server.means),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        }
    }

    /// Enabled services paired with their listen address.
    pub fn listeners(&self) -> Vec<(Protocol, String)> {
        [
            (Protocol::Echo, &self.echo),
            (Protocol::Prime, &self.prime),
            (Protocol::Means, &self.means),
        ]
        .into_iter()
        .filter(|(_, addr)| !addr.trim().is_empty())
        .map(|(protocol, addr)| (protocol, addr.trim().to_string()))
        .collect()
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
