//! Layered configuration loading.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, SpireConfig, TokenAlgorithm};

/// Configuration loader applying layers in order.
///
/// 1. Default values built into the code
/// 2. A TOML configuration file
/// 3. Environment variables under a prefix
///
/// Missing fields at any layer keep the value from the layer below.
///
/// # Example
///
/// ```no_run
/// use spire_config::ConfigLoader;
///
/// # fn main() -> Result<(), spire_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv()
///     .with_optional_file("spire.toml")?
///     .with_env_prefix("SPIRE")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: SpireConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SpireConfig::default(),
            env_prefix: None,
        }
    }

    /// Loads a `.env` file into the process environment.
    ///
    /// A missing `.env` file is not an error.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file does not exist, cannot be read,
    /// or contains invalid or unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = toml::from_str(&content)?;
        Ok(self)
    }

    /// Loads configuration from a TOML file if it exists.
    ///
    /// A missing file keeps the current layer untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file exists but cannot be read or
    /// parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing fails.
    pub fn with_string(mut self, content: &str) -> Result<Self, ConfigError> {
        self.config = toml::from_str(content)?;
        Ok(self)
    }

    /// Sets the environment variable prefix for overrides.
    ///
    /// Variables use the format `PREFIX__SECTION__KEY`, for example
    /// `SPIRE__SERVER__BIND_ADDR=127.0.0.1:3000`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Finalizes and returns the loaded configuration.
    ///
    /// Applies environment overrides (if a prefix was set) and validates the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override does not parse or validation
    /// fails.
    pub fn load(mut self) -> Result<SpireConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        self.config.validate()?;
        Ok(self.config)
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let env_vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(stripped) = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
        else {
            return Ok(());
        };

        let parts: Vec<&str> = stripped.split("__").collect();

        match parts.as_slice() {
            ["SERVER", "BIND_ADDR"] => {
                self.config.server.bind_addr = value.to_string();
            }
            ["SERVER", "BODY_LIMIT_BYTES"] => {
                self.config.server.body_limit_bytes = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["AUTH", "ALGORITHM"] => {
                self.config.auth.algorithm = match value.to_lowercase().as_str() {
                    "hs256" => TokenAlgorithm::Hs256,
                    "rs256" => TokenAlgorithm::Rs256,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'hs256' or 'rs256'",
                        ))
                    }
                };
            }
            ["AUTH", "HMAC_SECRET"] => {
                self.config.auth.hmac_secret = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            ["AUTH", "RSA_PEM_PATH"] => {
                self.config.auth.rsa_pem_path = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            ["AUTH", "ISSUER"] => {
                self.config.auth.issuer = value.to_string();
            }
            ["AUTH", "AUDIENCE"] => {
                self.config.auth.audience = value.to_string();
            }
            ["AUTH", "LEEWAY_SECS"] => {
                self.config.auth.leeway_secs = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "JSON"] => {
                self.config.logging.json = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            // Unknown keys under the prefix are ignored.
            _ => {}
        }

        Ok(())
    }
}

/// Parses a boolean from common spellings.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
