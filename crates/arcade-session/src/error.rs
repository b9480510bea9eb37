//! Error types for the session layer.

use arcade_protocol::Role;

/// Errors that can occur during registration, login, and session tracking.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A required credential field was empty.
    #[error("Missing fields.")]
    MissingFields,

    /// Registration failed because the name is taken for that role.
    #[error("Username already exists.")]
    UsernameTaken,

    /// Unknown username, wrong password, or wrong role.
    #[error("Invalid credentials.")]
    InvalidCredentials,

    /// The account+role is already held by another live connection.
    #[error("Account '{username}' is already logged in on another device.")]
    AlreadyOnline { username: String, role: Role },

    /// The command needs an authenticated session.
    #[error("Please login first.")]
    NotLoggedIn,

    /// The session's role may not run this command.
    #[error("Permission denied.")]
    PermissionDenied,

    /// The directory backend itself failed.
    #[error("account directory unavailable: {0}")]
    Unavailable(String),
}
