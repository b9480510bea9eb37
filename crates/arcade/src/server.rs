//! `ArcadeServer` builder and server loop.
//!
//! This is the entry point for running the broker. It ties the layers
//! together: transport → protocol → session → catalog / rooms.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arcade_catalog::Catalog;
use arcade_protocol::{Codec, JsonCodec};
use arcade_room::RoomRegistry;
use arcade_session::{AccountDirectory, InMemoryAccounts, OnlineRegistry};
use arcade_transport::{Transport, TcpTransport};

use crate::handler::handle_connection;
use crate::{ArcadeError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Each
/// registry guards itself.
pub(crate) struct ServerState<A: AccountDirectory, C: Codec> {
    pub(crate) accounts: A,
    pub(crate) online: OnlineRegistry,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) rooms: RoomRegistry,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for configuring and starting an Arcade server.
///
/// # Example
///
/// ```rust,no_run
/// use arcade::prelude::*;
///
/// # async fn start() -> Result<(), ArcadeError> {
/// let server = ArcadeServer::builder()
///     .bind("0.0.0.0:8888")
///     .build(InMemoryAccounts::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ArcadeServerBuilder {
    config: ServerConfig,
}

impl ArcadeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the data directory (package storage and staging).
    pub fn data_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Opens storage, binds the listener, and returns a server ready to
    /// [`run`](ArcadeServer::run).
    ///
    /// # Errors
    /// - [`ArcadeError::Config`] for an invalid configuration
    /// - [`ArcadeError::Catalog`] if the storage directory cannot be created
    /// - [`ArcadeError::Transport`] if the address cannot be bound
    pub async fn build<A: AccountDirectory>(
        self,
        accounts: A,
    ) -> Result<ArcadeServer<A, JsonCodec>, ArcadeError> {
        let config = self.config;
        config.validate()?;

        let catalog = Arc::new(Catalog::open(config.storage_dir()).await?);
        let rooms = RoomRegistry::new(Arc::clone(&catalog), config.orchestrator());
        let transport = TcpTransport::bind(&config.bind_addr)
            .await?
            .with_max_frame_len(config.max_frame_len);

        let state = Arc::new(ServerState {
            accounts,
            online: OnlineRegistry::new(),
            catalog,
            rooms,
            codec: JsonCodec,
            idle_timeout: config.idle_timeout(),
        });

        Ok(ArcadeServer { transport, state })
    }
}

impl Default for ArcadeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Arcade server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct ArcadeServer<A: AccountDirectory, C: Codec> {
    transport: TcpTransport,
    state: Arc<ServerState<A, C>>,
}

impl ArcadeServer<InMemoryAccounts, JsonCodec> {
    /// Creates a new builder. The directory passed to
    /// [`build`](ArcadeServerBuilder::build) picks the server's type.
    pub fn builder() -> ArcadeServerBuilder {
        ArcadeServerBuilder::new()
    }
}

impl<A, C> ArcadeServer<A, C>
where
    A: AccountDirectory,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ArcadeError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then stops every
    /// room and its worker.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ArcadeError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Arcade server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.transport.shutdown().await?;
        self.state.rooms.close_all().await;
        tracing::info!("Arcade server stopped");
        Ok(())
    }
}
