//! Connection configuration with builder pattern
//!
//! Provides defaults for the public Syncano API and an environment loader
//! (`SYNCANO_*` variables, optionally from a `.env` file).

use log::warn;
use std::time::Duration;

/// Default API root
pub const DEFAULT_API_ROOT: &str = "https://api.syncano.io/";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings used to open a [`Connection`](crate::api::Connection)
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Account key; a connection holding one is already authenticated
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub verify_ssl: bool,
    /// Dumps request parameters and disables certificate checks
    pub debug: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_API_ROOT.to_string(),
            email: None,
            password: None,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            verify_ssl: true,
            debug: false,
        }
    }
}

impl ConnectionConfig {
    /// Create a new builder for ConnectionConfig
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }

    /// Load config from `.env` and the process environment
    pub fn from_env() -> Self {
        // A missing .env file is not an error
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let timeout = match lookup("SYNCANO_TIMEOUT") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!("Ignoring invalid SYNCANO_TIMEOUT value: {}", raw);
                    defaults.timeout
                }
            },
            None => defaults.timeout,
        };

        Self {
            host: lookup("SYNCANO_APIROOT")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.host),
            email: lookup("SYNCANO_EMAIL").filter(|v| !v.is_empty()),
            password: lookup("SYNCANO_PASSWORD").filter(|v| !v.is_empty()),
            api_key: lookup("SYNCANO_APIKEY").filter(|v| !v.is_empty()),
            timeout,
            verify_ssl: lookup("SYNCANO_VERIFY_SSL")
                .map(|v| is_truthy(&v))
                .unwrap_or(defaults.verify_ssl),
            debug: lookup("SYNCANO_DEBUG")
                .map(|v| is_truthy(&v))
                .unwrap_or(defaults.debug),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Builder for ConnectionConfig
#[derive(Debug)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ConnectionConfig::default(),
        }
    }

    /// Set the API root
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.config.email = Some(email.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Use an existing account key and skip authentication
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    /// Set the timeout applied to every request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Enable/disable SSL certificate verification
    pub fn verify_ssl(mut self, enabled: bool) -> Self {
        self.config.verify_ssl = enabled;
        self
    }

    /// Enable/disable debug mode
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

impl Default for ConnectionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();

        assert_eq!(config.host, "https://api.syncano.io/");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.verify_ssl);
        assert!(!config.debug);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ConnectionConfig::builder()
            .host("https://example.com/")
            .email("dev@example.com")
            .password("secret")
            .timeout(Duration::from_secs(5))
            .verify_ssl(false)
            .debug(true)
            .build();

        assert_eq!(config.host, "https://example.com/");
        assert_eq!(config.email.as_deref(), Some("dev@example.com"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.verify_ssl);
        assert!(config.debug);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SYNCANO_APIROOT", "https://eu.example.com/"),
            ("SYNCANO_APIKEY", "abc123"),
            ("SYNCANO_DEBUG", "yes"),
            ("SYNCANO_TIMEOUT", "12"),
            ("SYNCANO_EMAIL", ""),
        ]);
        let config = ConnectionConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.host, "https://eu.example.com/");
        assert_eq!(config.api_key.as_deref(), Some("abc123"));
        assert!(config.debug);
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert!(config.email.is_none());
        assert!(config.verify_ssl);
    }

    #[test]
    fn test_from_lookup_invalid_timeout() {
        let config = ConnectionConfig::from_lookup(|k| {
            (k == "SYNCANO_TIMEOUT").then(|| "soon".to_string())
        });
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
