//! Endpoint Server - One Scrape Listener and Its Shutdown
//!
//! Serves a single route over HTTP or HTTPS until the cancellation
//! token fires, then drains for at most [`SHUTDOWN_GRACE`]. A server
//! that does not drain in time is abandoned: the process is exiting.
//!
//! Lifecycle: `Starting → Serving → ShuttingDown → Stopped`. A startup
//! failure goes straight from `Starting` to `Stopped`.
//!
//! Listeners bind `[::]:port`, which also accepts IPv4 on dual-stack
//! hosts. Hosts without IPv6 get `0.0.0.0:port` instead.

use std::future::IntoFuture;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::any;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use prometheus::Registry;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::handlers::{self, ScrapeState};
use crate::config::ServerEndpointConfig;
use crate::error::{Result, ServerError};
use crate::ports::tls::{CertificateProvisioner, TlsMinVersion};

/// Time a server gets to finish in-flight requests after cancellation.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Serving { addr: SocketAddr },
    ShuttingDown,
    Stopped,
}

impl ServerState {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Serving { addr } => Some(*addr),
            _ => None,
        }
    }
}

type ServeTask = JoinHandle<std::io::Result<()>>;

/// How a running listener is asked to drain.
enum Drain {
    /// Plain HTTP: the cancellation token is wired into axum's graceful shutdown.
    OnCancel,
    /// HTTPS: axum-server needs an explicit signal through its handle.
    Handle(axum_server::Handle),
}

pub struct EndpointServer {
    config: ServerEndpointConfig,
    registry: Registry,
    dummy: bool,
    provisioner: Arc<dyn CertificateProvisioner>,
    state: watch::Sender<ServerState>,
}

impl EndpointServer {
    pub fn new(
        config: ServerEndpointConfig,
        registry: Registry,
        dummy: bool,
        provisioner: Arc<dyn CertificateProvisioner>,
    ) -> Self {
        let (state, _) = watch::channel(ServerState::Starting);
        Self {
            config,
            registry,
            dummy,
            provisioner,
            state,
        }
    }

    pub fn name(&self) -> &'static str {
        if self.dummy {
            "dummy metrics server"
        } else {
            "prometheus metrics server"
        }
    }

    pub fn config(&self) -> &ServerEndpointConfig {
        &self.config
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    fn transition(&self, next: ServerState) {
        self.state.send_replace(next);
    }

    /// Serve until `cancel` fires.
    ///
    /// # Errors
    /// Startup failures (path, TLS, bind) and a listener that stops on
    /// its own are returned; the caller decides to abort. Shutdown
    /// problems are logged and never returned.
    #[instrument(skip_all, fields(port = self.config.port, path = %self.config.path))]
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let outcome = self.serve(&cancel).await;
        self.transition(ServerState::Stopped);
        outcome
    }

    async fn serve(&self, cancel: &CancellationToken) -> Result<()> {
        let app = self.router()?;

        let (mut task, local_addr, drain) = if self.config.secure {
            self.spawn_https(app)?
        } else {
            self.spawn_http(app, cancel)?
        };

        self.transition(ServerState::Serving { addr: local_addr });
        info!(
            addr = %local_addr,
            secure = self.config.secure,
            "Starting {} at localhost:{}{}",
            self.name(),
            local_addr.port(),
            self.config.path
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => {}
            outcome = &mut task => return Err(self.unexpected_exit(outcome)),
        }

        self.transition(ServerState::ShuttingDown);
        if let Drain::Handle(handle) = drain {
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
        self.drain(task).await;

        Ok(())
    }

    fn router(&self) -> Result<Router> {
        let path = self.config.path.as_str();
        if !path.starts_with('/') {
            return Err(ServerError::InvalidPath {
                path: path.to_string(),
            });
        }

        if self.dummy {
            return Ok(Router::new().route(path, any(handlers::dummy)));
        }

        let state = Arc::new(ScrapeState {
            registry: self.registry.clone(),
            ignore_errors: self.config.ignore_scrape_errors,
        });
        Ok(Router::new().route(path, any(handlers::scrape)).with_state(state))
    }

    /// Bind all interfaces, preferring the IPv6 wildcard.
    fn bind(&self) -> Result<(std::net::TcpListener, SocketAddr)> {
        let port = self.config.port;
        let dual = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));

        let (listener, addr) = match std::net::TcpListener::bind(dual) {
            Ok(listener) => (listener, dual),
            Err(err) if err.kind() != io::ErrorKind::AddrInUse => {
                debug!(error = %err, "IPv6 wildcard unavailable, listening on IPv4 only");
                let v4 = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
                let listener = std::net::TcpListener::bind(v4)
                    .map_err(|source| ServerError::Bind { addr: v4, source })?;
                (listener, v4)
            }
            Err(source) => return Err(ServerError::Bind { addr: dual, source }),
        };

        let bind_error = |source| ServerError::Bind { addr, source };
        listener.set_nonblocking(true).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        Ok((listener, local_addr))
    }

    fn spawn_http(&self, app: Router, cancel: &CancellationToken) -> Result<(ServeTask, SocketAddr, Drain)> {
        let (listener, local_addr) = self.bind()?;
        let listener = TcpListener::from_std(listener)
            .map_err(|source| ServerError::Bind { addr: local_addr, source })?;

        let shutdown = cancel.clone().cancelled_owned();
        let task = tokio::spawn(
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .into_future(),
        );

        Ok((task, local_addr, Drain::OnCancel))
    }

    fn spawn_https(&self, app: Router) -> Result<(ServeTask, SocketAddr, Drain)> {
        let min_version = TlsMinVersion::from_env()?;
        let tls = self.provisioner.server_config(min_version)?;
        let (listener, local_addr) = self.bind()?;

        let handle = axum_server::Handle::new();
        let server = axum_server::from_tcp_rustls(listener, RustlsConfig::from_config(Arc::new(tls)))
            .handle(handle.clone());
        let task = tokio::spawn(async move { server.serve(app.into_make_service()).await });

        Ok((task, local_addr, Drain::Handle(handle)))
    }

    /// Wait up to the grace period for the listener to finish.
    async fn drain(&self, mut task: ServeTask) {
        let port = self.config.port;
        let path = &self.config.path;

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => {
                info!("Successfully shutdown {} at localhost:{port}{path}", self.name());
            }
            Ok(Ok(Err(err))) => {
                info!(error = %err, "Unable to shutdown {} at localhost:{port}{path}", self.name());
            }
            Ok(Err(err)) => {
                info!(error = %err, "Unable to shutdown {} at localhost:{port}{path}", self.name());
            }
            Err(_) => {
                task.abort();
                info!(
                    grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
                    "Unable to shutdown {} at localhost:{port}{path}, abandoning",
                    self.name()
                );
            }
        }
    }

    fn unexpected_exit(&self, outcome: std::result::Result<std::io::Result<()>, JoinError>) -> ServerError {
        let reason = match outcome {
            Ok(Ok(())) => "listener closed".to_string(),
            Ok(Err(err)) => err.to_string(),
            Err(err) => err.to_string(),
        };
        ServerError::Serve {
            name: self.name(),
            port: self.config.port,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tls::SelfSignedProvisioner;

    fn config(path: &str) -> ServerEndpointConfig {
        ServerEndpointConfig {
            port: 0,
            path: path.to_string(),
            ..ServerEndpointConfig::default()
        }
    }

    fn server(config: ServerEndpointConfig, dummy: bool) -> EndpointServer {
        EndpointServer::new(
            config,
            Registry::new(),
            dummy,
            Arc::new(SelfSignedProvisioner::default()),
        )
    }

    #[test]
    fn test_server_names() {
        assert_eq!(server(config("/metrics"), true).name(), "dummy metrics server");
        assert_eq!(server(config("/metrics"), false).name(), "prometheus metrics server");
    }

    #[tokio::test]
    async fn test_relative_path_is_fatal() {
        let server = server(config("metrics"), false);
        let state = server.subscribe();

        let err = server.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidPath { .. }));
        assert_eq!(*state.borrow(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_lifecycle_reaches_stopped_after_cancel() {
        let server = server(config("/metrics"), true);
        let mut state = server.subscribe();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(server.run(cancel.clone()));

        let serving = state
            .wait_for(|s| matches!(s, ServerState::Serving { .. }))
            .await
            .unwrap()
            .local_addr();
        assert!(serving.is_some());

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(*state.borrow(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_wildcard_listener_accepts_ipv4_loopback() {
        let server = server(config("/metrics"), true);
        let mut state = server.subscribe();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(server.run(cancel.clone()));

        let addr = state
            .wait_for(|s| matches!(s, ServerState::Serving { .. }))
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        assert!(addr.ip().is_unspecified());

        let stream = tokio::net::TcpStream::connect(("127.0.0.1", addr.port())).await;
        assert!(stream.is_ok());

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_fatal() {
        let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let server = server(
            ServerEndpointConfig {
                port,
                ..config("/metrics")
            },
            false,
        );

        let err = server.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
