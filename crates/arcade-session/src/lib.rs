//! Account and session management for Arcade.
//!
//! 1. **Accounts**: registering and verifying credentials
//!    ([`AccountDirectory`] trait, [`InMemoryAccounts`])
//! 2. **Online registry**: at most one live connection per account+role
//!    ([`OnlineRegistry`])
//! 3. **Session state**: what one connection is logged in as and which
//!    room it is in ([`Session`])
//!
//! ```text
//! Server handler (above)  ← owns one Session per connection
//!     ↕
//! Session layer (this crate)  ← identity, duplicate-login guard
//!     ↕
//! Protocol layer (below)  ← Account, Role, RoomId
//! ```

mod auth;
mod error;
mod online;
mod session;

pub use auth::{AccountDirectory, InMemoryAccounts};
pub use error::SessionError;
pub use online::{Acquire, OnlineKey, OnlineRegistry};
pub use session::{Session, Teardown};
