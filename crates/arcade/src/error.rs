//! Unified error type for the Arcade server.

use arcade_catalog::CatalogError;
use arcade_protocol::{GameId, ProtocolError};
use arcade_room::RoomError;
use arcade_session::SessionError;
use arcade_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ArcadeError {
    /// A transport-level error (bind, send, recv, oversized frame).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unknown command).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An account or session error (credentials, duplicate login, role).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A catalog error (ownership, versions, reviews, storage).
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A room error (not found, ports, staging, worker).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A game cannot be unpublished while rooms still run it.
    #[error("Cannot unpublish: There are active rooms playing this game. Please wait or close them first.")]
    GameInUse(GameId),

    /// Bad or unreadable server configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ArcadeError {
    /// The text sent to the client in an `ERROR` response.
    ///
    /// Storage, staging, and process failures are reported generically;
    /// their detail only goes to the log.
    pub fn client_message(&self) -> String {
        match self {
            Self::Protocol(ProtocolError::MissingCommand) => "Missing command.".to_string(),
            Self::Protocol(ProtocolError::InvalidFields { .. }) => {
                "Missing or invalid fields.".to_string()
            }
            Self::Catalog(CatalogError::Io(_)) => "Server storage error.".to_string(),
            Self::Session(SessionError::Unavailable(_)) => {
                "Account service unavailable.".to_string()
            }
            Self::Transport(_) | Self::Config(_) => "Internal server error.".to_string(),
            other => other.to_string(),
        }
    }

    /// Returns `true` for failures of the server or its environment rather
    /// than of the request.
    pub fn is_external(&self) -> bool {
        match self {
            Self::Room(e) => matches!(
                e,
                RoomError::PackageMissing(_)
                    | RoomError::Extract(_)
                    | RoomError::Manifest(_)
                    | RoomError::SpawnFailed(_)
                    | RoomError::Io(_)
            ),
            Self::Catalog(CatalogError::Io(_) | CatalogError::PackageMissing(_)) => true,
            Self::Session(SessionError::Unavailable(_)) => true,
            Self::Transport(_) | Self::Config(_) => true,
            _ => false,
        }
    }
}
