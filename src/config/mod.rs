//! Configuration module for the voice relay server
//!
//! Handles server configuration from .env files, YAML files, and environment
//! variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Example
//! ```rust,no_run
//! use voice_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::audio::DEFAULT_FRAME_BYTES;
use crate::core::error::{RelayError, RelayResult};
use crate::core::relay::RelaySessionConfig;
use crate::core::upstream::UpstreamConfig;

/// Default listen host
const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port
const DEFAULT_PORT: u16 = 8090;

/// Default upstream connect timeout (ms)
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Server configuration
///
/// Contains all configuration needed to run the relay server:
/// - Server settings (host, port)
/// - Upstream speech API settings (API key, model, voice, instructions)
/// - Audio settings (frame size)
/// - Security settings (CORS)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    /// OpenAI API key for the Realtime API
    pub openai_api_key: Option<String>,
    /// Realtime model identifier (e.g., "gpt-4o-realtime-preview")
    pub openai_model: Option<String>,
    /// Voice for spoken output (e.g., "alloy")
    pub openai_voice: Option<String>,
    /// System instructions for the assistant
    pub instructions: Option<String>,
    /// Sampling temperature (0.6 to 1.2)
    pub temperature: Option<f32>,

    /// Upstream connect timeout in milliseconds
    /// Default: 10000
    pub connect_timeout_ms: u64,

    /// Input audio frame size in bytes
    /// Default: 4800 (100ms of PCM16 mono at 24kHz)
    pub frame_bytes: usize,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
}

/// YAML configuration file schema
///
/// Every field is optional; anything not set in the file falls back to the
/// environment-derived value.
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    host: Option<String>,
    port: Option<u16>,
    openai_api_key: Option<String>,
    openai_model: Option<String>,
    openai_voice: Option<String>,
    instructions: Option<String>,
    temperature: Option<f32>,
    connect_timeout_ms: Option<u64>,
    frame_bytes: Option<usize>,
    cors_allowed_origins: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// Reads:
    /// - `HOST`, `PORT` - listen address (default 0.0.0.0:8090)
    /// - `OPENAI_API_KEY` - upstream API key
    /// - `OPENAI_REALTIME_MODEL`, `OPENAI_REALTIME_VOICE` - model selection
    /// - `RELAY_INSTRUCTIONS`, `RELAY_TEMPERATURE` - session tuning
    /// - `RELAY_CONNECT_TIMEOUT_MS` - upstream connect timeout
    /// - `RELAY_FRAME_BYTES` - input frame size
    /// - `CORS_ALLOWED_ORIGINS` - CORS configuration
    ///
    /// Note: .env file loading happens in main.rs at application startup.
    pub fn from_env() -> RelayResult<Self> {
        let config = Self {
            host: std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: parse_env("PORT")?.unwrap_or(DEFAULT_PORT),
            openai_api_key: read_env("OPENAI_API_KEY"),
            openai_model: read_env("OPENAI_REALTIME_MODEL"),
            openai_voice: read_env("OPENAI_REALTIME_VOICE"),
            instructions: read_env("RELAY_INSTRUCTIONS"),
            temperature: parse_env("RELAY_TEMPERATURE")?,
            connect_timeout_ms: parse_env("RELAY_CONNECT_TIMEOUT_MS")?
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
            frame_bytes: parse_env("RELAY_FRAME_BYTES")?.unwrap_or(DEFAULT_FRAME_BYTES),
            cors_allowed_origins: read_env("CORS_ALLOWED_ORIGINS"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    pub fn from_file(path: &PathBuf) -> RelayResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RelayError::InvalidConfiguration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let yaml: YamlConfig = serde_yaml::from_str(&contents).map_err(|e| {
            RelayError::InvalidConfiguration(format!(
                "Invalid YAML in {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_env()?;
        if let Some(host) = yaml.host {
            config.host = host;
        }
        if let Some(port) = yaml.port {
            config.port = port;
        }
        if yaml.openai_api_key.is_some() {
            config.openai_api_key = yaml.openai_api_key;
        }
        if yaml.openai_model.is_some() {
            config.openai_model = yaml.openai_model;
        }
        if yaml.openai_voice.is_some() {
            config.openai_voice = yaml.openai_voice;
        }
        if yaml.instructions.is_some() {
            config.instructions = yaml.instructions;
        }
        if yaml.temperature.is_some() {
            config.temperature = yaml.temperature;
        }
        if let Some(timeout) = yaml.connect_timeout_ms {
            config.connect_timeout_ms = timeout;
        }
        if let Some(frame_bytes) = yaml.frame_bytes {
            config.frame_bytes = frame_bytes;
        }
        if yaml.cors_allowed_origins.is_some() {
            config.cors_allowed_origins = yaml.cors_allowed_origins;
        }

        config.validate()?;
        Ok(config)
    }

    /// Get the server address as a string in "host:port" form
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the upstream session configuration
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` when no API key is set.
    pub fn upstream_config(&self) -> RelayResult<UpstreamConfig> {
        let api_key = self.openai_api_key.clone().ok_or_else(|| {
            RelayError::InvalidConfiguration(
                "OPENAI_API_KEY is required to connect upstream".to_string(),
            )
        })?;
        Ok(UpstreamConfig {
            api_key,
            model: self.openai_model.clone().unwrap_or_default(),
            voice: self.openai_voice.clone(),
            instructions: self.instructions.clone(),
            temperature: self.temperature,
            connect_timeout_ms: self.connect_timeout_ms,
        })
    }

    /// Build the relay session configuration
    pub fn relay_config(&self) -> RelaySessionConfig {
        RelaySessionConfig {
            frame_bytes: self.frame_bytes,
            ..RelaySessionConfig::default()
        }
    }

    fn validate(&self) -> RelayResult<()> {
        if self.frame_bytes == 0 {
            return Err(RelayError::InvalidConfiguration(
                "frame_bytes must be greater than zero".to_string(),
            ));
        }
        if self.frame_bytes % 2 != 0 {
            return Err(RelayError::InvalidConfiguration(format!(
                "frame_bytes must be even for 16-bit PCM, got {}",
                self.frame_bytes
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(RelayError::InvalidConfiguration(
                "connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(temperature) = self.temperature
            && !(0.6..=1.2).contains(&temperature)
        {
            return Err(RelayError::InvalidConfiguration(format!(
                "temperature must be between 0.6 and 1.2, got {}",
                temperature
            )));
        }
        Ok(())
    }
}

/// Read an environment variable, treating empty values as unset
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable into a typed value
fn parse_env<T: std::str::FromStr>(name: &str) -> RelayResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match read_env(name) {
        Some(raw) => raw.parse::<T>().map(Some).map_err(|e| {
            RelayError::InvalidConfiguration(format!("Invalid value for {}: {}", name, e))
        }),
        None => Ok(None),
    }
}
