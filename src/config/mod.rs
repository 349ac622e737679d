//! Configuration for vassal.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VassalConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_ip: String,
    /// HTTP port.
    pub port: u16,
    /// Base URL used when rendering queue URLs. Derived from `bind_ip` and
    /// `port` when unset.
    pub base_url: Option<String>,
}

impl ServerConfig {
    /// Effective base URL for queue URLs.
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.bind_ip, self.port))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. `info`, `vassal=debug`).
    pub level: String,
}

impl Default for VassalConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_ip: "127.0.0.1".to_string(),
                port: 9324,
                base_url: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl VassalConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_ip.is_empty() {
            return Err(Error::Config("bind_ip must not be empty".to_string()));
        }
        if let Some(base_url) = &self.server.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(Error::Config(format!(
                    "base_url must be an http(s) URL, got {}",
                    base_url
                )));
            }
            if base_url.ends_with('/') {
                return Err(Error::Config(
                    "base_url must not end with a slash".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VassalConfig::default();
        assert_eq!(config.server.bind_ip, "127.0.0.1");
        assert_eq!(config.server.port, 9324);
        assert_eq!(config.server.base_url(), "http://127.0.0.1:9324");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_base_url() {
        let mut config = VassalConfig::default();
        config.server.base_url = Some("http://sqs.local:4100".to_string());
        assert_eq!(config.server.base_url(), "http://sqs.local:4100");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = VassalConfig::default();
        config.server.base_url = Some("sqs.local:4100".to_string());
        assert!(config.validate().is_err());

        config.server.base_url = Some("http://sqs.local:4100/".to_string());
        assert!(config.validate().is_err());
    }
}
