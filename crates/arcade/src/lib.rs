//! # Arcade
//!
//! Multiplayer game distribution and session broker.
//!
//! Developers publish versioned game packages; players browse, download,
//! and launch short-lived rooms, each backed by the game's own server
//! process on a port the broker picks. Clients speak length-prefixed JSON
//! over TCP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arcade::prelude::*;
//!
//! # async fn start() -> Result<(), ArcadeError> {
//! let server = ArcadeServer::builder()
//!     .bind("127.0.0.1:8888")
//!     .data_dir("./data")
//!     .build(InMemoryAccounts::new())
//!     .await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::ArcadeError;
pub use server::{ArcadeServer, ArcadeServerBuilder};

/// Everything needed to run a server or write a client.
pub mod prelude {
    pub use crate::{ArcadeError, ArcadeServer, ArcadeServerBuilder, ServerConfig};
    pub use arcade_catalog::{Catalog, CatalogError};
    pub use arcade_protocol::{
        Account, AccountId, Codec, GameId, JsonCodec, PackageUpload, Request, Response,
        ResponseBody, Role, RoomId, Status,
    };
    pub use arcade_room::{OrchestratorConfig, RoomError};
    pub use arcade_session::{AccountDirectory, InMemoryAccounts, SessionError};
    pub use arcade_transport::{read_frame, write_frame, DEFAULT_MAX_FRAME_LEN};
}
