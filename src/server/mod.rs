//! HTTP host for the ESI processor.
//!
//! The [`Server`] accepts HTTP/1.1 connections, turns every request into a
//! [`RequestContext`](crate::core::RequestContext) and hands it to an
//! [`EsiProcessor`] wrapping the inner handler. Fatal ESI errors become
//! plain-text `500` (`502` for failed includes) responses.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_esi::esi::EsiProcessor;
//! use tokio_esi::handler::StaticHandler;
//! use tokio_esi::server::Server;
//!
//! let handler = StaticHandler::new(&config.server.document_root, &config.server.index_file);
//! let processor = EsiProcessor::from_config(handler, &config.esi).with_metrics(metrics.clone());
//!
//! let server = Server::new(config.server, processor, metrics);
//! server.run().await?;
//! ```
//!
//! # Graceful Shutdown
//!
//! ```rust,ignore
//! server.trigger_shutdown();
//! server.wait_for_drain(server.drain_timeout()).await;
//! ```

mod connection;
mod internal;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use connection::ConnectionContext;
use internal::{run_internal_server, InternalState};

use crate::config::ServerConfig;
use crate::esi::EsiProcessor;
use crate::handler::Handler;
use crate::observability::Metrics;

/// HTTP server running an [`EsiProcessor`].
pub struct Server<H> {
    config: ServerConfig,
    processor: Arc<EsiProcessor<H>>,
    metrics: Arc<Metrics>,
    /// Active connections counter
    active_connections: Arc<AtomicUsize>,
    /// Shutdown signal sender
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver (cloneable)
    shutdown_rx: watch::Receiver<bool>,
    /// Shutdown initiated flag
    shutdown_initiated: AtomicBool,
}

impl<H: Handler + 'static> Server<H> {
    /// Create a new server.
    pub fn new(config: ServerConfig, processor: EsiProcessor<H>, metrics: Arc<Metrics>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            processor: Arc::new(processor),
            metrics,
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            shutdown_rx,
            shutdown_initiated: AtomicBool::new(false),
        }
    }

    /// Get current active connections count.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bind the configured addresses and serve until shutdown.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;

        let internal = match self.config.internal_addr {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };

        self.serve(listener, internal).await
    }

    /// Serve on already bound listeners until shutdown.
    pub async fn serve(
        &self,
        listener: TcpListener,
        internal: Option<TcpListener>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let local_addr = listener.local_addr()?;
        info!(
            "Server listening on http://{} (handler: {}, max ESI depth: {})",
            local_addr,
            self.processor.handler().name(),
            self.processor.max_depth()
        );

        let internal_handle = internal.map(|internal| self.spawn_internal(internal));

        let ctx = Arc::new(ConnectionContext {
            processor: Arc::clone(&self.processor),
            metrics: Arc::clone(&self.metrics),
            active_connections: Arc::clone(&self.active_connections),
            server_name: self.config.server_name.clone(),
            local_addr,
            access_log_enabled: self.config.access_log,
        });

        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            continue;
                        }
                    };

                    let _ = stream.set_nodelay(true);

                    let ctx = Arc::clone(&ctx);
                    let conn_shutdown = self.shutdown_rx.clone();

                    tokio::spawn(async move {
                        ctx.handle_connection(stream, remote_addr, conn_shutdown).await;
                    });
                }
                _ = shutdown_rx.changed() => {
                    debug!("Received shutdown signal, stopping accept loop");
                    break;
                }
            }
        }

        if let Some(handle) = internal_handle {
            let _ = handle.await;
        }

        Ok(())
    }

    fn spawn_internal(&self, listener: TcpListener) -> tokio::task::JoinHandle<()> {
        let addr = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_default();

        let state = Arc::new(InternalState {
            metrics: Arc::clone(&self.metrics),
            active_connections: Arc::clone(&self.active_connections),
            started_at: Instant::now(),
        });
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!("Internal server listening on http://{}", addr);

        tokio::spawn(async move {
            tokio::select! {
                result = run_internal_server(listener, state) => {
                    if let Err(e) = result {
                        error!("Internal server error: {}", e);
                    }
                }
                _ = shutdown_rx.changed() => {
                    debug!("Internal server received shutdown signal");
                }
            }
        })
    }

    /// Trigger graceful shutdown.
    /// Stops accepting and lets open connections finish their current request.
    pub fn trigger_shutdown(&self) {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            return; // Already initiated
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured drain timeout.
    pub fn drain_timeout(&self) -> Duration {
        self.config.drain_timeout
    }

    /// Wait for all active connections to drain.
    /// Returns true if drained successfully, false if timeout was reached.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let check_interval = Duration::from_millis(100);

        loop {
            let active = self.active_connections.load(Ordering::Relaxed);
            if active == 0 {
                return true;
            }

            if start.elapsed() >= timeout {
                warn!("Drain timeout reached with {} active connections", active);
                return false;
            }

            debug!("Waiting for {} connections to drain...", active);
            tokio::time::sleep(check_interval).await;
        }
    }

    /// Configured listen address.
    pub fn listen_addr(&self) -> SocketAddr {
        self.config.listen_addr
    }
}
