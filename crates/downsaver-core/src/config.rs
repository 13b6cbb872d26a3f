//! Configuration module
//!
//! Configuration is resolved once into an immutable [`Config`] value. Library code receives
//! that value and never reads the process environment on its own; binaries call
//! [`Config::from_env`] at startup.

use std::env;

/// 100 MiB
pub const DEFAULT_STAGING_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;
const DEFAULT_RELAY_URL: &str = "http://localhost:4000";
const DEFAULT_SERVER_PORT: u16 = 4000;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_ACCEPTED_EXTENSIONS: &str = "3dm";

/// Settings of the relay server process
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

/// Settings of the upload/convert flow
#[derive(Clone, Debug)]
pub struct ConverterConfig {
    /// Converter base URL. `None` routes every call through the relay.
    pub converter_url: Option<String>,
    pub relay_url: String,
    pub staging_threshold_bytes: u64,
    pub max_upload_bytes: Option<u64>,
    /// Lowercase extensions without the dot. Empty accepts any file.
    pub accepted_extensions: Vec<String>,
    pub connect_timeout_secs: u64,
}

/// Where converter calls are sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Straight to the converter service (`/presign`, `/convert`, `/convert-by-key`)
    Converter(String),
    /// Through the same-origin relay (`/api/presign`, `/api/convert`, `/api/convert-by-key`)
    Relay(String),
}

impl Endpoint {
    pub fn base_url(&self) -> &str {
        match self {
            Endpoint::Converter(url) | Endpoint::Relay(url) => url,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Endpoint::Converter(_))
    }

    fn prefix(&self) -> &'static str {
        match self {
            Endpoint::Converter(_) => "",
            Endpoint::Relay(_) => "/api",
        }
    }

    pub fn presign_url(&self) -> String {
        format!("{}{}/presign", self.base_url(), self.prefix())
    }

    pub fn convert_url(&self) -> String {
        format!("{}{}/convert", self.base_url(), self.prefix())
    }

    pub fn convert_by_key_url(&self) -> String {
        format!("{}{}/convert-by-key", self.base_url(), self.prefix())
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    base: BaseConfig,
    converter: ConverterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base: BaseConfig {
                server_port: DEFAULT_SERVER_PORT,
                cors_origins: vec!["*".to_string()],
                environment: "development".to_string(),
            },
            converter: ConverterConfig {
                converter_url: None,
                relay_url: DEFAULT_RELAY_URL.to_string(),
                staging_threshold_bytes: DEFAULT_STAGING_THRESHOLD_BYTES,
                max_upload_bytes: None,
                accepted_extensions: split_list(DEFAULT_ACCEPTED_EXTENSIONS),
                connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
        }
    }
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or(defaults.base.environment);

        let cors_origins = var("CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.base.cors_origins);

        let server_port = match var("PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            None => DEFAULT_SERVER_PORT,
        };

        let staging_threshold_bytes = match var("STAGING_THRESHOLD_BYTES") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                anyhow::anyhow!("STAGING_THRESHOLD_BYTES must be a whole number of bytes")
            })?,
            None => DEFAULT_STAGING_THRESHOLD_BYTES,
        };

        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                anyhow::anyhow!("MAX_UPLOAD_BYTES must be a whole number of bytes")
            })?),
            None => None,
        };

        let accepted_extensions = match lookup("ACCEPTED_EXTENSIONS") {
            Some(raw) => split_list(&raw),
            None => defaults.converter.accepted_extensions,
        };

        let connect_timeout_secs = match var("HTTP_CONNECT_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                anyhow::anyhow!("HTTP_CONNECT_TIMEOUT_SECS must be a whole number of seconds")
            })?,
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        let config = Config {
            base: BaseConfig {
                server_port,
                cors_origins,
                environment,
            },
            converter: ConverterConfig {
                converter_url: var("CONVERTER_API_URL").map(|u| normalize_url(&u)),
                relay_url: var("RELAY_URL")
                    .map(|u| normalize_url(&u))
                    .unwrap_or(defaults.converter.relay_url),
                staging_threshold_bytes,
                max_upload_bytes,
                accepted_extensions,
                connect_timeout_secs,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.converter.converter_url {
            if !is_http_url(url) {
                return Err(anyhow::anyhow!(
                    "CONVERTER_API_URL must start with http:// or https://"
                ));
            }
        }

        if !is_http_url(&self.converter.relay_url) {
            return Err(anyhow::anyhow!(
                "RELAY_URL must start with http:// or https://"
            ));
        }

        if self.converter.staging_threshold_bytes == 0 {
            return Err(anyhow::anyhow!(
                "STAGING_THRESHOLD_BYTES must be greater than 0"
            ));
        }

        if self.converter.max_upload_bytes == Some(0) {
            return Err(anyhow::anyhow!("MAX_UPLOAD_BYTES must be greater than 0"));
        }

        if self.converter.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "HTTP_CONNECT_TIMEOUT_SECS must be greater than 0"
            ));
        }

        if self.is_production() && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Copy with a different converter URL (CLI overrides).
    pub fn with_converter_url(mut self, url: Option<String>) -> Self {
        self.converter.converter_url = url.map(|u| normalize_url(&u));
        self
    }

    pub fn with_relay_url(mut self, url: String) -> Self {
        self.converter.relay_url = normalize_url(&url);
        self
    }

    pub fn with_staging_threshold(mut self, bytes: u64) -> Self {
        self.converter.staging_threshold_bytes = bytes;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: Option<u64>) -> Self {
        self.converter.max_upload_bytes = bytes;
        self
    }

    pub fn with_accepted_extensions(mut self, extensions: Vec<String>) -> Self {
        self.converter.accepted_extensions = extensions;
        self
    }

    /// Endpoint used by clients: the converter when configured, otherwise the relay.
    pub fn endpoint(&self) -> Endpoint {
        match &self.converter.converter_url {
            Some(url) => Endpoint::Converter(url.clone()),
            None => Endpoint::Relay(self.converter.relay_url.clone()),
        }
    }

    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.base.environment
    }

    pub fn converter_url(&self) -> Option<&str> {
        self.converter.converter_url.as_deref()
    }

    pub fn relay_url(&self) -> &str {
        &self.converter.relay_url
    }

    pub fn staging_threshold_bytes(&self) -> u64 {
        self.converter.staging_threshold_bytes
    }

    pub fn max_upload_bytes(&self) -> Option<u64> {
        self.converter.max_upload_bytes
    }

    pub fn accepted_extensions(&self) -> &[String] {
        &self.converter.accepted_extensions
    }

    pub fn connect_timeout_secs(&self) -> u64 {
        self.converter.connect_timeout_secs
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
