//! Error types for the room layer.
//!
//! `Display` strings are what clients see. Variants carrying detail for the
//! logs (`Extract`, `Manifest`, `SpawnFailed`, `Io`) keep it out of the
//! message.

use arcade_protocol::{GameId, RoomId};

/// Errors that can occur while creating or joining rooms.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No artifact with this id exists.
    #[error("Game not found.")]
    GameNotFound(GameId),

    /// The artifact exists but is not published.
    #[error("Game is unpublished/inactive.")]
    Unpublished(GameId),

    /// The room does not exist (never did, or already closed).
    #[error("Room not found.")]
    RoomNotFound(RoomId),

    /// The catalog points at a package file that is gone.
    #[error("Game package missing on server.")]
    PackageMissing(GameId),

    /// The package is not a readable zip archive.
    #[error("Failed to unpack game package.")]
    Extract(String),

    /// `game_config.json` is missing or malformed.
    #[error("Game configuration is missing or invalid.")]
    Manifest(String),

    /// Every port in the range is claimed or in use.
    #[error("No free ports available.")]
    NoFreePorts,

    /// The worker process could not be started.
    #[error("Failed to start game server.")]
    SpawnFailed(#[source] std::io::Error),

    /// Filesystem failure while staging.
    #[error("Server storage error.")]
    Io(#[from] std::io::Error),
}

impl RoomError {
    /// Detail for the server log; the `Display` text stays generic.
    pub fn detail(&self) -> String {
        match self {
            Self::Extract(detail) | Self::Manifest(detail) => detail.clone(),
            Self::SpawnFailed(e) | Self::Io(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_failures_hide_detail() {
        let err = RoomError::Extract("invalid Zip archive: bad header at /srv/x".into());
        assert_eq!(err.to_string(), "Failed to unpack game package.");
        assert!(err.detail().contains("/srv/x"));
    }

    #[test]
    fn test_not_found_messages() {
        assert_eq!(RoomError::RoomNotFound(RoomId(3)).to_string(), "Room not found.");
        assert_eq!(RoomError::NoFreePorts.to_string(), "No free ports available.");
    }
}
