//! # Spire Config
//!
//! Typed TOML configuration with layered loading.
//!
//! Configuration applies in layers, later layers overriding earlier ones:
//! defaults built into the code, then an optional TOML file, then environment
//! variables under the `SPIRE` prefix (`SPIRE__SECTION__KEY`). A `.env` file
//! is honored via `dotenvy`.
//!
//! # Example
//!
//! ```no_run
//! use spire_config::ConfigLoader;
//!
//! # fn main() -> Result<(), spire_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()
//!     .with_optional_file("spire.toml")?
//!     .with_env_prefix("SPIRE")
//!     .load()?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/spire-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{AuthConfig, LoggingConfig, ServerConfig, SpireConfig, TokenAlgorithm};
pub use error::ConfigError;
pub use loader::ConfigLoader;
