//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the labeling console, supporting TOML files
//! with environment-variable overrides, validation, and typed access to all
//! system settings.
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Command line arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration files
//! 4. Default values (lowest priority)
//!
//! ## Usage
//! ```rust
//! use sentiment_console::config::Config;
//!
//! let config = Config::default();
//! assert_eq!(config.query.default_page_size, 20);
//! ```

use crate::errors::{ConsoleError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server and API configuration
    pub server: ServerConfig,
    /// Backend endpoint settings for the console client
    pub backend: BackendConfig,
    /// Query and pagination limits
    pub query: QueryConfig,
    /// Sentiment model settings
    pub model: ModelConfig,
    /// Dataset upload limits
    pub upload: UploadConfig,
    /// Export settings
    pub export: ExportConfig,
    /// Logging and monitoring
    pub logging: LoggingConfig,
    /// Performance tuning
    pub performance: PerformanceConfig,
}

/// Server and API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Maximum upload payload size in MB
    pub max_payload_size_mb: u32,
    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
    /// Enable CORS for browser frontends
    pub enable_cors: bool,
}

/// Backend endpoint configuration for the console-side client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL including the API scope, e.g. `http://localhost:8080/api`
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

/// Query and pagination limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Page size applied when the request omits one
    pub default_page_size: usize,
    /// Upper bound on requested page sizes
    pub max_page_size: usize,
}

/// Sentiment model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Optional TOML file with extra lexicon entries
    pub lexicon_path: Option<PathBuf>,
    /// Balance threshold below which a text is considered neutral, in [0, 1]
    pub neutral_band: f64,
    /// Lower clamp for reported confidence
    pub min_confidence: f64,
    /// Upper clamp for reported confidence
    pub max_confidence: f64,
}

/// Dataset upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum records accepted per uploaded file
    pub max_records: usize,
    /// Maximum length of a single text, in characters
    pub max_text_length: usize,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Download filename sent in the Content-Disposition header
    pub filename: String,
}

/// Logging and monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file path (optional, logs to stdout if not specified)
    pub file_path: Option<PathBuf>,
    /// Enable structured JSON logging
    pub json_format: bool,
}

/// Performance tuning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Number of HTTP worker threads
    pub worker_threads: usize,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConsoleError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConsoleError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("SENTIMENT_CONSOLE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SENTIMENT_CONSOLE_PORT") {
            self.server.port = port.parse().map_err(|_| ConsoleError::Config {
                message: "Invalid port number in SENTIMENT_CONSOLE_PORT".to_string(),
            })?;
        }
        if let Ok(base_url) = std::env::var("SENTIMENT_CONSOLE_BACKEND_URL") {
            self.backend.base_url = base_url;
        }
        if let Ok(level) = std::env::var("SENTIMENT_CONSOLE_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ConsoleError::Validation {
                field: "server.port".to_string(),
                reason: "Port cannot be zero".to_string(),
            });
        }

        if self.query.default_page_size == 0 {
            return Err(ConsoleError::Validation {
                field: "query.default_page_size".to_string(),
                reason: "Default page size must be greater than zero".to_string(),
            });
        }

        if self.query.max_page_size < self.query.default_page_size {
            return Err(ConsoleError::Validation {
                field: "query.max_page_size".to_string(),
                reason: "Maximum page size cannot be smaller than the default".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.model.neutral_band) {
            return Err(ConsoleError::Validation {
                field: "model.neutral_band".to_string(),
                reason: "Neutral band must be within [0, 1]".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.model.min_confidence)
            || !(0.0..=1.0).contains(&self.model.max_confidence)
            || self.model.min_confidence > self.model.max_confidence
        {
            return Err(ConsoleError::Validation {
                field: "model.min_confidence".to_string(),
                reason: "Confidence clamps must satisfy 0 <= min <= max <= 1".to_string(),
            });
        }

        if self.upload.max_records == 0 {
            return Err(ConsoleError::Validation {
                field: "upload.max_records".to_string(),
                reason: "Upload record limit must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Get configuration as TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConsoleError::Config {
            message: format!("Failed to serialize config to TOML: {}", e),
        })
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                max_payload_size_mb: 10,
                request_timeout_seconds: 30,
                enable_cors: true,
            },
            backend: BackendConfig {
                base_url: "http://127.0.0.1:8080/api".to_string(),
                timeout_seconds: 30,
                user_agent: "sentiment-console/0.1".to_string(),
            },
            query: QueryConfig {
                default_page_size: 20,
                max_page_size: 100,
            },
            model: ModelConfig {
                lexicon_path: None,
                neutral_band: 0.25,
                min_confidence: 0.5,
                max_confidence: 0.99,
            },
            upload: UploadConfig {
                max_records: 100_000,
                max_text_length: 10_000,
            },
            export: ExportConfig {
                filename: "sentiment_data.csv".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                json_format: false,
            },
            performance: PerformanceConfig {
                worker_threads: num_cpus::get(),
            },
        }
    }
}
