//! Configuration validation
//!
//! Checks relay-specific settings at startup to catch misconfigurations early.

use anyhow::Result;
use downsaver_core::Config;

pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.converter_url().is_none() {
        tracing::warn!(
            "CONVERTER_API_URL is not set - every relay endpoint will answer 500 until it is configured"
        );
    }

    if config.cors_origins().is_empty() {
        return Err(anyhow::anyhow!(
            "CORS_ORIGINS is empty. Use '*' in development or list the allowed origins."
        ));
    }

    if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_defaults_without_converter() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_wildcard_cors_in_production() {
        let config = Config::from_source(|key| match key {
            "ENVIRONMENT" => Some("production".to_string()),
            _ => None,
        });
        assert!(config.is_err());
    }
}
