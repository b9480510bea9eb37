//! Error types for the catalog.

use arcade_protocol::GameId;

/// Errors that can occur while publishing, fetching, or reviewing games.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Name, version, or package bytes were empty.
    #[error("Missing game data.")]
    MissingFields,

    /// No artifact with this id exists.
    #[error("Game not found.")]
    GameNotFound(GameId),

    /// Another developer already owns an artifact with this name.
    #[error("Game Name '{0}' is taken by another developer.")]
    NameTaken(String),

    /// An upload targeted an artifact that is already published.
    #[error("Game '{0}' already active. Please use 'Update Game'.")]
    AlreadyActive(String),

    /// An update targeted a name the developer does not own.
    #[error("Game '{0}' not found or you don't own it. Please use 'Upload New Game' first.")]
    NotOwnedByYou(String),

    /// An id-based operation was attempted by someone other than the owner.
    #[error("Permission denied: You do not own this game.")]
    NotOwner(GameId),

    /// An update did not change the version.
    #[error("Version {0} already exists. Please bump the version.")]
    SameVersion(String),

    /// A review rating outside 1..=5.
    #[error("Rating must be 1-5.")]
    InvalidRating(i64),

    /// The player has never created or joined a room for this game.
    #[error("You must play the game before reviewing.")]
    NotPlayed,

    /// The catalog entry exists but its package file is gone.
    #[error("Game file missing on server.")]
    PackageMissing(GameId),

    /// Reading or writing package storage failed.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}
