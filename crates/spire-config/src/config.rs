//! Main configuration types.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Complete Spire server configuration.
///
/// Root configuration type containing all sections. Use
/// [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use spire_config::SpireConfig;
///
/// let config = SpireConfig::default();
/// assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpireConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Bearer-token validation configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SpireConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the bind address does not parse, the body
    /// limit is zero, or the configured key material does not match the
    /// algorithm.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .bind_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.bind_addr",
                format!("invalid socket address: {}", self.server.bind_addr),
            ));
        }

        if self.server.body_limit_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.body_limit_bytes",
                "must be greater than zero",
            ));
        }

        match self.auth.algorithm {
            TokenAlgorithm::Hs256 => {
                if self.auth.rsa_pem_path.is_some() && self.auth.hmac_secret.is_none() {
                    return Err(ConfigError::invalid_value(
                        "auth.rsa_pem_path",
                        "rsa_pem_path is set but algorithm is hs256",
                    ));
                }
            }
            TokenAlgorithm::Rs256 => {
                if self.auth.hmac_secret.is_some() && self.auth.rsa_pem_path.is_none() {
                    return Err(ConfigError::invalid_value(
                        "auth.hmac_secret",
                        "hmac_secret is set but algorithm is rs256",
                    ));
                }
            }
        }

        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address the server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// JWT signing algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenAlgorithm {
    /// HMAC shared secret (HS256).
    #[default]
    Hs256,
    /// RSA public key (RS256).
    Rs256,
}

/// Bearer-token validation configuration.
///
/// Exactly one kind of key material applies: `hmac_secret` for `hs256`,
/// `rsa_pem_path` for `rs256`. The material itself is resolved at server
/// startup, so secrets can arrive through the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Signing algorithm tokens must use.
    #[serde(default)]
    pub algorithm: TokenAlgorithm,

    /// HMAC shared secret, required for `hs256`.
    #[serde(default)]
    pub hmac_secret: Option<String>,

    /// Path to an RSA public key PEM file, required for `rs256`.
    #[serde(default)]
    pub rsa_pem_path: Option<String>,

    /// Expected token issuer.
    #[serde(default)]
    pub issuer: String,

    /// Expected token audience.
    #[serde(default)]
    pub audience: String,

    /// Clock-skew leeway for expiry checks, in seconds.
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: TokenAlgorithm::default(),
            hmac_secret: None,
            rsa_pem_path: None,
            issuer: String::new(),
            audience: String::new(),
            leeway_secs: default_leeway_secs(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level or filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to emit JSON-formatted logs.
    #[serde(default = "default_log_json")]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_log_json(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

const fn default_body_limit() -> usize {
    1_048_576
}

const fn default_leeway_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_json() -> bool {
    true
}
