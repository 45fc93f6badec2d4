//! # Spire Server
//!
//! Hyper 1.x HTTP/1.1 server for Spire operations.
//!
//! One task per accepted connection. Requests route through the
//! [`Gateway`]: reserved endpoints (`/healthz`, `/openapi.json`, `/docs`),
//! the WebSocket namespace at `/ws/operations`, and everything else through
//! the operation registry and dispatch middleware. Streaming operations
//! answer with NDJSON by default and SSE when the `Accept` header asks for
//! `text/event-stream`. Shutdown on SIGTERM/SIGINT drains open connections
//! before exiting.
//!
//! # Example
//!
//! ```no_run
//! use spire_config::ConfigLoader;
//! use spire_registry::RegistryBuilder;
//! use spire_server::Server;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()
//!     .with_optional_file("spire.toml")?
//!     .with_env_prefix("SPIRE")
//!     .load()?;
//!
//! let registry = RegistryBuilder::new().build()?;
//! Server::from_config(&config, registry)?.run().await?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/spire-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod gateway;
mod server;
mod shutdown;
mod upgrade;

pub use error::ServerError;
pub use gateway::{Gateway, ResponseBody, REQUEST_ID_HEADER};
pub use server::{Server, WS_ROUTE};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
