//! Server assembly, accept loop, and per-connection handling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{Method, Request, Response};
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use spire_auth::{KeyMaterial, TokenValidator};
use spire_config::{AuthConfig, ConfigError, SpireConfig, TokenAlgorithm};
use spire_dispatch::Dispatcher;
use spire_registry::OperationRegistry;
use spire_ws::drive_socket;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};
use tungstenite::protocol::Role;

use crate::error::ServerError;
use crate::gateway::{self, Gateway, ResponseBody};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use crate::upgrade;

/// Route carrying the WebSocket operations namespace.
pub const WS_ROUTE: &str = "/ws/operations";

/// Title used in the generated OpenAPI document and docs page.
const API_TITLE: &str = "Spire Operations API";

/// How long draining connections get before shutdown stops waiting.
const DRAIN_GRACE: Duration = Duration::from_secs(30);

/// The Spire HTTP server.
///
/// Built once from configuration and a registry, then consumed by
/// [`run`](Server::run). Every accepted connection runs on its own task;
/// requests flow through the [`Gateway`] and the dispatch middleware.
///
/// # Example
///
/// ```no_run
/// use spire_config::SpireConfig;
/// use spire_registry::RegistryBuilder;
/// use spire_server::Server;
///
/// # async fn run() -> Result<(), spire_server::ServerError> {
/// let mut config = SpireConfig::default();
/// config.auth.hmac_secret = Some("shared-secret".to_string());
///
/// let registry = RegistryBuilder::new().build().expect("no duplicates");
/// Server::from_config(&config, registry)?.run().await
/// # }
/// ```
pub struct Server {
    bind_addr: SocketAddr,
    body_limit: usize,
    dispatcher: Arc<Dispatcher>,
    gateway: Gateway,
}

impl Server {
    /// Assembles a server from configuration and a built registry.
    ///
    /// Resolves the token key material here so a missing secret or an
    /// unreadable PEM file fails at startup, not on the first request.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the configuration is invalid, key
    /// material is missing or unreadable, or RSA PEM material does not
    /// parse.
    pub fn from_config(
        config: &SpireConfig,
        registry: OperationRegistry,
    ) -> Result<Self, ServerError> {
        config.validate()?;
        let bind_addr = config.server.bind_addr.parse().map_err(|_| {
            ConfigError::invalid_value(
                "server.bind_addr",
                format!("invalid socket address: {}", config.server.bind_addr),
            )
        })?;

        let validator = build_validator(&config.auth)?;
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), Arc::new(validator)));
        let gateway = Gateway::new(
            Arc::clone(&dispatcher),
            API_TITLE,
            env!("CARGO_PKG_VERSION"),
        );

        Ok(Self {
            bind_addr,
            body_limit: config.server.body_limit_bytes,
            dispatcher,
            gateway,
        })
    }

    /// Returns the configured bind address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Runs the server until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the listener cannot bind.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals())
            .await
    }

    /// Runs the server until the given signal fires.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the listener cannot bind.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| ServerError::bind(self.bind_addr, e))?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already-bound listener.
    ///
    /// After the signal fires, in-flight connections get [`DRAIN_GRACE`] to
    /// finish before the server stops waiting for them.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the listener's local address cannot be
    /// read.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, operations = self.dispatcher.registry().len(), "Server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Connection accepted");
                        let server = Arc::clone(&server);
                        let shutdown = shutdown.clone();
                        let token = tracker.acquire();
                        tokio::spawn(async move {
                            handle_connection(server, stream, shutdown).await;
                            drop(token);
                        });
                    }
                    Err(error) => {
                        warn!(%error, "Failed to accept connection");
                    }
                },
                () = shutdown.wait() => break,
            }
        }

        if tracker.active() > 0 {
            info!(connections = tracker.active(), "Draining connections");
        }
        tokio::select! {
            () = tracker.wait_idle() => {
                info!("Server stopped");
            }
            () = tokio::time::sleep(DRAIN_GRACE) => {
                warn!(
                    connections = tracker.active(),
                    "Drain grace expired with connections still open"
                );
            }
        }
        Ok(())
    }

    /// Handles one request on an accepted connection.
    async fn handle_request(&self, request: Request<Incoming>) -> Response<ResponseBody> {
        if request.uri().path() == WS_ROUTE {
            return self.handle_websocket(request);
        }

        if request.method() == Method::GET {
            match request.uri().path() {
                "/healthz" => return self.gateway.health(),
                "/openapi.json" => return self.gateway.openapi(),
                "/docs" => return self.gateway.docs(),
                _ => {}
            }
        }

        let (parts, body) = request.into_parts();
        let body = match collect_limited(body, self.body_limit).await {
            Ok(bytes) => bytes,
            Err(BodyError::TooLarge) => return gateway::payload_too_large(self.body_limit),
            Err(BodyError::Read(message)) => {
                debug!(message, "Failed to read request body");
                return gateway::unreadable_body();
            }
        };

        self.gateway
            .dispatch(&parts.method, parts.uri.path(), &parts.headers, body)
            .await
    }

    /// Performs the WebSocket handshake and spawns the session driver.
    ///
    /// The `Authorization` header captured at upgrade time authenticates
    /// every stream started on the socket.
    fn handle_websocket(&self, request: Request<Incoming>) -> Response<ResponseBody> {
        let accept = match upgrade::validate_upgrade(request.headers()) {
            Ok(accept) => accept,
            Err(reason) => {
                debug!(reason, "Rejected WebSocket upgrade");
                return gateway::upgrade_rejected(reason);
            }
        };

        let authorization = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let dispatcher = Arc::clone(&self.dispatcher);
        let upgrading = hyper::upgrade::on(request);

        tokio::spawn(async move {
            let upgraded = match upgrading.await {
                Ok(upgraded) => upgraded,
                Err(error) => {
                    warn!(%error, "WebSocket upgrade failed");
                    return;
                }
            };
            let socket =
                WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None).await;
            if let Err(error) = drive_socket(socket, dispatcher, authorization).await {
                debug!(%error, "WebSocket session ended with transport error");
            }
        });

        upgrade::switching_protocols(&accept)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("bind_addr", &self.bind_addr)
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

/// Serves one connection, honoring shutdown via hyper's graceful path so
/// in-flight requests complete before the socket closes.
async fn handle_connection(server: Arc<Server>, stream: TcpStream, shutdown: ShutdownSignal) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |request| {
        let server = Arc::clone(&server);
        async move {
            Ok::<_, std::convert::Infallible>(server.handle_request(request).await)
        }
    });

    let connection = http1::Builder::new()
        .serve_connection(io, service)
        .with_upgrades();
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => {
            if let Err(error) = result {
                debug!(%error, "Connection ended with error");
            }
        }
        () = shutdown.wait() => {
            connection.as_mut().graceful_shutdown();
            if let Err(error) = connection.as_mut().await {
                debug!(%error, "Connection ended during shutdown");
            }
        }
    }
}

/// Failure modes while reading a request body.
#[derive(Debug)]
enum BodyError {
    /// The body exceeded the configured limit.
    TooLarge,
    /// The body could not be read from the peer.
    Read(String),
}

/// Collects a request body, enforcing the configured size limit.
async fn collect_limited<B>(body: B, limit: usize) -> Result<Bytes, BodyError>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(error) if error.is::<http_body_util::LengthLimitError>() => Err(BodyError::TooLarge),
        Err(error) => Err(BodyError::Read(error.to_string())),
    }
}

/// Resolves key material from configuration and builds the validator.
fn build_validator(auth: &AuthConfig) -> Result<TokenValidator, ServerError> {
    let material = match auth.algorithm {
        TokenAlgorithm::Hs256 => {
            let secret = auth
                .hmac_secret
                .as_ref()
                .ok_or_else(|| ConfigError::missing_field("auth.hmac_secret"))?;
            KeyMaterial::HmacSecret(secret.clone())
        }
        TokenAlgorithm::Rs256 => {
            let path = auth
                .rsa_pem_path
                .as_ref()
                .ok_or_else(|| ConfigError::missing_field("auth.rsa_pem_path"))?;
            let pem = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::read_error(path, e))?;
            KeyMaterial::RsaPem(pem)
        }
    };

    let validator = TokenValidator::new(&material, auth.issuer.as_str(), auth.audience.as_str())?;
    Ok(validator.with_leeway(auth.leeway_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use spire_registry::RegistryBuilder;

    fn config_with_secret() -> SpireConfig {
        let mut config = SpireConfig::default();
        config.auth.hmac_secret = Some("server-test-secret".to_string());
        config
    }

    #[test]
    fn test_from_config_without_key_material_fails() {
        let registry = RegistryBuilder::new().build().expect("empty registry");
        let result = Server::from_config(&SpireConfig::default(), registry);
        let err = result.expect_err("missing secret");
        assert!(err.to_string().contains("auth.hmac_secret"));
    }

    #[test]
    fn test_from_config_with_secret_binds_the_configured_address() {
        let registry = RegistryBuilder::new().build().expect("empty registry");
        let server =
            Server::from_config(&config_with_secret(), registry).expect("server builds");
        assert_eq!(server.bind_addr().port(), 8080);
    }

    #[test]
    fn test_build_validator_requires_pem_path_for_rs256() {
        let auth = AuthConfig {
            algorithm: TokenAlgorithm::Rs256,
            ..AuthConfig::default()
        };
        let err = build_validator(&auth).expect_err("missing path");
        assert!(err.to_string().contains("auth.rsa_pem_path"));
    }

    #[test]
    fn test_build_validator_reports_unreadable_pem_file() {
        let auth = AuthConfig {
            algorithm: TokenAlgorithm::Rs256,
            rsa_pem_path: Some("/nonexistent/public.pem".to_string()),
            ..AuthConfig::default()
        };
        let err = build_validator(&auth).expect_err("unreadable file");
        assert!(err.to_string().contains("/nonexistent/public.pem"));
    }

    #[test]
    fn test_build_validator_accepts_hmac_material() {
        let auth = AuthConfig {
            hmac_secret: Some("secret".to_string()),
            ..AuthConfig::default()
        };
        assert!(build_validator(&auth).is_ok());
    }

    #[tokio::test]
    async fn test_collect_limited_within_limit() {
        let body = Full::new(Bytes::from_static(b"hello"));
        let bytes = collect_limited(body, 1024).await.expect("within limit");
        assert_eq!(bytes, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_collect_limited_over_limit() {
        let body = Full::new(Bytes::from(vec![0u8; 64]));
        let result = collect_limited(body, 16).await;
        assert!(matches!(result, Err(BodyError::TooLarge)));
    }
}
