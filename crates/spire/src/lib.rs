//! # Spire
//!
//! **Request dispatch framework with lifecycle-hooked operations**
//!
//! Spire is an opinionated dispatch layer for JSON-over-HTTP services:
//!
//! - **Lifecycle-hooked operations** - `on_before`, `authorize`, `validate`,
//!   `handle`, `on_after`, driven strictly in order
//! - **Bearer-token identity** - JWT validation folding claims into an
//!   ordered claim set, user and service principals discriminated
//! - **Static operation registry** - explicit registration keyed by
//!   `(route, method)`, duplicates rejected at startup
//! - **Streaming operations** - NDJSON, SSE, and WebSocket transports with
//!   cooperative per-request cancellation
//! - **OpenAPI synthesis** - a 3.1 document and Swagger UI reflected over
//!   the registry
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spire::prelude::*;
//!
//! struct CreateTag;
//!
//! impl Operation<CreateTagRequest, CreateTagResponse> for CreateTag {
//!     async fn handle(
//!         &self,
//!         ctx: &RequestContext,
//!         request: CreateTagRequest,
//!     ) -> Result<CreateTagResponse, DispatchError> {
//!         // Your handler logic here
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_dotenv()
//!         .with_optional_file("spire.toml")?
//!         .with_env_prefix("SPIRE")
//!         .load()?;
//!
//!     let registry = RegistryBuilder::new()
//!         .operation(OperationEntry::unary(
//!             "/tag/create",
//!             HttpMethod::Post,
//!             "tag",
//!             AuthPolicy::User,
//!             CreateTag,
//!         ))
//!         .build()?;
//!
//!     Server::from_config(&config, registry)?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Every request passes through the same fixed pipeline:
//!
//! ```text
//! Request → Identity → Policy → on_before → authorize → validate → handle
//!                                                                    ↓
//! Response ← Envelope ← Logging ← on_after ←───────────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/spire/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use spire_core as core;

// Re-export token validation
pub use spire_auth as auth;

// Re-export the operation registry
pub use spire_registry as registry;

// Re-export the dispatch middleware
pub use spire_dispatch as dispatch;

// Re-export streaming primitives
pub use spire_stream as stream;

// Re-export the WebSocket transport
pub use spire_ws as ws;

// Re-export OpenAPI synthesis
pub use spire_docs as docs;

// Re-export configuration loading
pub use spire_config as config;

// Re-export logging initialization
pub use spire_telemetry as telemetry;

// Re-export the HTTP server
pub use spire_server as server;

/// Prelude module for convenient imports.
///
/// `spire_docs::Operation` (the OpenAPI path-item operation) is deliberately
/// absent; it would shadow the [`Operation`](spire_core::Operation) trait.
/// Reach documentation types through [`docs`](crate::docs).
///
/// # Example
///
/// ```rust,ignore
/// use spire::prelude::*;
/// ```
pub mod prelude {
    pub use spire_core::{
        ClaimSet, DispatchError, DispatchResult, Empty, ErrorEnvelope, NoContent, Operation,
        Principal, RequestContext, RequestId, ServicePrincipal, UserPrincipal, UserScoped,
    };

    // Re-export registry types
    pub use spire_registry::{
        AuthPolicy, HttpMethod, OperationEntry, OperationRegistry, RegistryBuilder,
    };

    // Re-export the dispatch middleware
    pub use spire_dispatch::{DispatchReply, Dispatcher, FrameStream};

    // Re-export streaming types
    pub use spire_stream::{
        CancelRegistry, CancelToken, Frame, NdjsonEncoder, SseEncoder, StreamOperation,
        ValueStream,
    };

    // Re-export token validation
    pub use spire_auth::{KeyMaterial, TokenValidator};

    // Re-export the WebSocket protocol
    pub use spire_ws::{ClientMessage, ServerMessage};

    // Re-export configuration loading
    pub use spire_config::{ConfigLoader, SpireConfig};

    // Re-export the server
    pub use spire_server::Server;
}
