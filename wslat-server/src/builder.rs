//! Server builder and main server implementation.

use crate::broadcast::Broadcaster;
use crate::echo::{EchoPayload, EchoResponder};
use crate::error::ServerError;
use crate::handler::PeerHandler;
use crate::registry::PeerRegistry;
use crate::stats::{ServerStats, ServerStatsSnapshot};
use std::net::{Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use wslat_core::{ConfigError, Generator, Model};
use wslat_transport::{FrameHandler, Incoming, WsListener, WsServerConfig};
use wslat_transport::ws::DEFAULT_PATH;

/// Builder for configuring and creating a server.
pub struct ServerBuilder {
    bind_addr: SocketAddr,
    model: Model,
    rate: u32,
    payload_size: usize,
    max_connections: usize,
    path: Option<String>,
    echo_payload: EchoPayload,
    stop_grace: Duration,
}

impl ServerBuilder {
    /// Creates a new server builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 10443)),
            model: Model::Push,
            rate: 10,
            payload_size: 100,
            max_connections: 1000,
            path: Some(DEFAULT_PATH.to_string()),
            echo_payload: EchoPayload::Verbatim,
            stop_grace: Duration::from_secs(5),
        }
    }

    /// Sets the bind address.
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the interaction model.
    #[must_use]
    pub fn model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the push event rate.
    #[must_use]
    pub fn rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Sets the push payload size.
    #[must_use]
    pub fn payload_size(mut self, size: usize) -> Self {
        self.payload_size = size;
        self
    }

    /// Sets the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the upgrade path; `None` accepts any path.
    #[must_use]
    pub fn path(mut self, path: Option<String>) -> Self {
        self.path = path;
        self
    }

    /// Sets the echo payload policy.
    #[must_use]
    pub fn echo_payload(mut self, policy: EchoPayload) -> Self {
        self.echo_payload = policy;
        self
    }

    /// Sets the grace period for stopping the push generator.
    #[must_use]
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Builds the server and handle.
    #[must_use]
    pub fn build(self) -> (Server, ServerHandle) {
        let registry = Arc::new(PeerRegistry::new());
        let stats = Arc::new(ServerStats::default());
        let shutdown = CancellationToken::new();
        let (bound_tx, bound_rx) = watch::channel(None);

        let server = Server {
            bind_addr: self.bind_addr,
            model: self.model,
            rate: self.rate,
            payload_size: self.payload_size,
            max_connections: self.max_connections,
            path: self.path,
            echo_payload: self.echo_payload,
            stop_grace: self.stop_grace,
            registry: Arc::clone(&registry),
            stats: Arc::clone(&stats),
            shutdown: shutdown.clone(),
            bound_tx,
        };

        let handle = ServerHandle {
            registry,
            stats,
            shutdown,
            bound_rx,
        };

        (server, handle)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The main server instance.
pub struct Server {
    bind_addr: SocketAddr,
    model: Model,
    rate: u32,
    payload_size: usize,
    max_connections: usize,
    path: Option<String>,
    echo_payload: EchoPayload,
    stop_grace: Duration,
    registry: Arc<PeerRegistry>,
    stats: Arc<ServerStats>,
    shutdown: CancellationToken,
    bound_tx: watch::Sender<Option<SocketAddr>>,
}

impl Server {
    /// Runs the server until [`ServerHandle::shutdown`] is called.
    ///
    /// In push mode a generator broadcasts events to every connected peer
    /// for the lifetime of the server. On shutdown the generator is stopped
    /// and every peer is closed.
    ///
    /// # Errors
    /// Returns `ServerError` if the rate is zero or the listener cannot bind.
    pub async fn run(&self) -> Result<(), ServerError> {
        let rate = NonZeroU32::new(self.rate).ok_or(ConfigError::ZeroRate)?;

        let listener = WsListener::bind(
            WsServerConfig::new(self.bind_addr).path(self.path.clone()),
        )
        .await?;
        let local_addr = listener.local_addr()?;
        self.bound_tx.send_replace(Some(local_addr));
        tracing::info!("Server listening on {} ({} model)", local_addr, self.model);

        let echo = match self.model {
            Model::RequestResponse => Some(EchoResponder::new(
                self.echo_payload,
                Arc::clone(&self.stats),
            )),
            Model::Push => None,
        };
        let handler: Arc<dyn FrameHandler> = Arc::new(PeerHandler::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.stats),
            echo,
        ));

        let generator = match self.model {
            Model::Push => Some(Generator::start(
                rate,
                Broadcaster::new(
                    Arc::clone(&self.registry),
                    Arc::clone(&self.stats),
                    self.payload_size,
                ),
            )),
            Model::RequestResponse => None,
        };

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,

                result = listener.accept() => match result {
                    Ok(incoming) => self.handle_incoming(incoming, &handler),
                    Err(e) => tracing::error!("Accept error: {}", e),
                },
            }
        }

        tracing::info!("Server shutdown requested");
        if let Some(generator) = generator {
            generator.stop(self.stop_grace).await;
        }
        let closed = self.registry.close_all();
        tracing::info!("Server stopped, closed {} sessions", closed);
        Ok(())
    }

    fn handle_incoming(&self, incoming: Incoming, handler: &Arc<dyn FrameHandler>) {
        let peer_addr = incoming.peer_addr();
        let Some(slot) = self.registry.reserve(self.max_connections) else {
            ServerStats::incr(&self.stats.rejected);
            tracing::warn!("Max connections reached, rejecting {}", peer_addr);
            return;
        };

        let registry = Arc::clone(&self.registry);
        let stats = Arc::clone(&self.stats);
        let handler = Arc::clone(handler);

        tokio::spawn(async move {
            match incoming.upgrade(handler).await {
                Ok(conn) => {
                    let Some(id) = slot.register(conn.clone()) else {
                        tracing::debug!("Server stopped, closing session from {}", peer_addr);
                        conn.close();
                        return;
                    };
                    // The peer may have left before it was registered.
                    if conn.is_closed() {
                        registry.remove(id);
                        return;
                    }
                    ServerStats::incr(&stats.accepted);
                    tracing::info!("Session {} connected from {}", id, peer_addr);
                }
                Err(e) => tracing::warn!("Handshake with {} failed: {}", peer_addr, e),
            }
        });
    }
}

/// Handle for controlling the server from outside.
#[derive(Clone)]
pub struct ServerHandle {
    registry: Arc<PeerRegistry>,
    stats: Arc<ServerStats>,
    shutdown: CancellationToken,
    bound_rx: watch::Receiver<Option<SocketAddr>>,
}

impl ServerHandle {
    /// Requests server shutdown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Waits until the server is listening and returns its address.
    /// Returns `None` if the server stopped before binding.
    pub async fn bound_addr(&self) -> Option<SocketAddr> {
        let mut rx = self.bound_rx.clone();
        let addr = rx.wait_for(Option::is_some).await.ok()?;
        *addr
    }

    /// Returns the number of connected peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns the server counters.
    #[must_use]
    pub fn stats(&self) -> ServerStatsSnapshot {
        self.stats.snapshot(self.registry.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_builder_new() {
        let builder = ServerBuilder::new();
        assert_eq!(builder.bind_addr.port(), 10443);
        assert_eq!(builder.model, Model::Push);
        assert_eq!(builder.rate, 10);
        assert_eq!(builder.path.as_deref(), Some("/ws"));
    }

    #[test]
    fn test_server_builder_default() {
        let builder = ServerBuilder::default();
        assert_eq!(builder.max_connections, 1000);
        assert_eq!(builder.echo_payload, EchoPayload::Verbatim);
    }

    #[test]
    fn test_server_builder_chain() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let builder = ServerBuilder::new()
            .bind(addr)
            .model(Model::RequestResponse)
            .rate(50)
            .payload_size(8)
            .max_connections(2)
            .path(None)
            .echo_payload(EchoPayload::FillEmpty(8))
            .stop_grace(Duration::from_millis(10));
        assert_eq!(builder.bind_addr, addr);
        assert_eq!(builder.model, Model::RequestResponse);
        assert_eq!(builder.rate, 50);
        assert_eq!(builder.payload_size, 8);
        assert_eq!(builder.max_connections, 2);
        assert!(builder.path.is_none());
        assert_eq!(builder.echo_payload, EchoPayload::FillEmpty(8));
    }

    #[tokio::test]
    async fn test_zero_rate_rejected() {
        let (server, handle) = ServerBuilder::new()
            .bind("127.0.0.1:0".parse().unwrap())
            .rate(0)
            .build();
        let result = server.run().await;
        assert!(matches!(
            result,
            Err(ServerError::Config(ConfigError::ZeroRate))
        ));
        drop(server);
        assert_eq!(handle.bound_addr().await, None);
    }

    #[tokio::test]
    async fn test_run_and_shutdown() {
        let (server, handle) = ServerBuilder::new()
            .bind("127.0.0.1:0".parse().unwrap())
            .build();
        let task = tokio::spawn(async move { server.run().await });

        let addr = handle.bound_addr().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(handle.peer_count(), 0);

        handle.shutdown();
        task.await.unwrap().unwrap();
        assert_eq!(handle.stats().accepted, 0);
    }

    async fn start(builder: ServerBuilder) -> (ServerHandle, String, tokio::task::JoinHandle<()>) {
        let (server, handle) = builder.bind("127.0.0.1:0".parse().unwrap()).build();
        let task = tokio::spawn(async move {
            server.run().await.unwrap();
        });
        let addr = handle.bound_addr().await.unwrap();
        (handle, format!("ws://{addr}/ws"), task)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rtt_end_to_end() {
        let (handle, url, task) = start(ServerBuilder::new().model(Model::RequestResponse)).await;

        let config = wslat_core::RunConfig::new(url)
            .model(Model::RequestResponse)
            .rate(20)
            .duration(Duration::from_secs(1))
            .warmup(2);
        let (run, _run_handle) = wslat_client::RunBuilder::new(config).build();
        let report = run.run().await.unwrap();

        let rtt = report.rtt.unwrap();
        assert!(rtt.count >= 10, "only {} samples", rtt.count);
        assert!(rtt.min >= 0);
        assert!(rtt.min as f64 <= rtt.mean && rtt.mean <= rtt.max as f64);
        assert!(rtt.p10 <= rtt.p50 && rtt.p50 <= rtt.p90 && rtt.p90 <= rtt.p99);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.counters.parse_errors, 0);
        assert!(handle.stats().sent >= report.counters.received);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_push_end_to_end() {
        let (handle, url, task) = start(ServerBuilder::new().rate(50).payload_size(16)).await;

        let config = wslat_core::RunConfig::new(url)
            .duration(Duration::from_secs(1))
            .warmup(5);
        let (run, _run_handle) = wslat_client::RunBuilder::new(config).build();
        let report = run.run().await.unwrap();

        assert!(report.rtt.is_none());
        assert!(report.one_way.count >= 20, "only {} samples", report.one_way.count);
        assert!(report.one_way.min >= 0);
        assert_eq!(report.skipped, 5);
        assert!(handle.stats().events > 0);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_max_connections_rejects() {
        let (handle, url, task) = start(
            ServerBuilder::new()
                .model(Model::RequestResponse)
                .max_connections(0),
        )
        .await;

        let config = wslat_core::RunConfig::new(url)
            .model(Model::RequestResponse)
            .connect_timeout(Duration::from_secs(2));
        let (run, _run_handle) = wslat_client::RunBuilder::new(config).build();
        assert!(run.run().await.is_err());
        assert_eq!(handle.stats().rejected, 1);
        assert_eq!(handle.peer_count(), 0);

        handle.shutdown();
        task.await.unwrap();
    }
}
