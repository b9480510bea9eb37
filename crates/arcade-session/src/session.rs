//! Per-connection session state.
//!
//! A [`Session`] is owned by exactly one connection handler and dies with
//! the connection. It starts unauthenticated, becomes authenticated after a
//! successful login, and tracks at most one room at a time.
//!
//! ```text
//!   Anonymous ──(login)──→ Authenticated ──(create/join)──→ In room
//!                              ↑                               │
//!                              └───────────(leave)─────────────┘
//! ```

use std::net::SocketAddr;

use arcade_protocol::{Account, AccountId, RoomId, Role};

use crate::{OnlineKey, SessionError};

/// Everything the server knows about one connection.
#[derive(Debug, Clone)]
pub struct Session {
    peer_addr: SocketAddr,
    account: Option<Account>,
    room: Option<RoomId>,
}

/// What a session still holds when its connection ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teardown {
    /// Online registry entry to release.
    pub online: Option<OnlineKey>,
    /// Room to leave, with the account that is in it.
    pub room: Option<(RoomId, AccountId)>,
}

impl Session {
    /// A fresh, unauthenticated session for the peer at `peer_addr`.
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            account: None,
            room: None,
        }
    }

    /// The remote address; also the value stored in the online registry.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// The logged-in account, if any.
    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    /// Marks the session as authenticated. Returns the previous account
    /// when the connection switches identity.
    pub fn authenticate(&mut self, account: Account) -> Option<Account> {
        self.account.replace(account)
    }

    /// Requires any authenticated account.
    ///
    /// # Errors
    /// [`SessionError::NotLoggedIn`] for anonymous sessions.
    pub fn require_login(&self) -> Result<&Account, SessionError> {
        self.account.as_ref().ok_or(SessionError::NotLoggedIn)
    }

    /// Requires an authenticated account with the given role.
    ///
    /// # Errors
    /// [`SessionError::PermissionDenied`] when anonymous or the role differs.
    pub fn require_role(&self, role: Role) -> Result<&Account, SessionError> {
        match &self.account {
            Some(account) if account.role == role => Ok(account),
            _ => Err(SessionError::PermissionDenied),
        }
    }

    /// The room this connection is in, if any.
    pub fn room(&self) -> Option<RoomId> {
        self.room
    }

    /// Records entry into `room_id`. Returns the room previously tracked.
    pub fn enter_room(&mut self, room_id: RoomId) -> Option<RoomId> {
        self.room.replace(room_id)
    }

    /// Stops tracking a room. Returns the room that was tracked.
    pub fn clear_room(&mut self) -> Option<RoomId> {
        self.room.take()
    }

    /// Empties the session and returns what must be released. Calling it
    /// twice yields an empty [`Teardown`] the second time.
    pub fn take_teardown(&mut self) -> Teardown {
        let account = self.account.take();
        let room = self.room.take();
        Teardown {
            online: account.as_ref().map(OnlineKey::for_account),
            room: match (room, account) {
                (Some(room_id), Some(account)) => Some((room_id, account.id)),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    fn player(name: &str) -> Account {
        Account {
            id: AccountId(1),
            username: name.into(),
            role: Role::Player,
        }
    }

    #[test]
    fn test_new_session_is_anonymous() {
        let session = Session::new(peer());
        assert!(session.account().is_none());
        assert!(matches!(session.require_login(), Err(SessionError::NotLoggedIn)));
    }

    #[test]
    fn test_require_role_checks_role() {
        let mut session = Session::new(peer());
        session.authenticate(player("p1"));

        assert!(session.require_role(Role::Player).is_ok());
        assert!(matches!(
            session.require_role(Role::Developer),
            Err(SessionError::PermissionDenied)
        ));
    }

    #[test]
    fn test_authenticate_returns_previous_account() {
        let mut session = Session::new(peer());
        assert!(session.authenticate(player("p1")).is_none());
        let previous = session.authenticate(player("p2")).unwrap();
        assert_eq!(previous.username, "p1");
        assert_eq!(session.account().map(|a| a.username.as_str()), Some("p2"));
    }

    #[test]
    fn test_enter_room_replaces_tracked_room() {
        let mut session = Session::new(peer());
        assert_eq!(session.enter_room(RoomId(1)), None);
        assert_eq!(session.enter_room(RoomId(2)), Some(RoomId(1)));
        assert_eq!(session.clear_room(), Some(RoomId(2)));
        assert_eq!(session.room(), None);
    }

    #[test]
    fn test_take_teardown_runs_once() {
        let mut session = Session::new(peer());
        session.authenticate(player("p1"));
        session.enter_room(RoomId(4));

        let first = session.take_teardown();
        assert_eq!(first.online, Some(OnlineKey::new("p1", Role::Player)));
        assert_eq!(first.room, Some((RoomId(4), AccountId(1))));

        let second = session.take_teardown();
        assert_eq!(second, Teardown { online: None, room: None });
    }
}
