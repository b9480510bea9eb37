//! The online registry: which connection holds which identity.
//!
//! One live session per (username, role). The registry maps each
//! [`OnlineKey`] to the network address of the connection that logged in
//! with it. Every operation runs its whole check-and-mutate sequence under
//! one lock, so two connections racing to log in as the same account can
//! never both succeed.
//!
//! ```text
//! login ──→ try_acquire ──→ Acquired ──→ ... ──→ disconnect ──→ release
//!               │
//!               └──→ AlreadyOwnedByOther (login rejected, nothing changes)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use arcade_protocol::{Account, Role};
use tokio::sync::Mutex;

/// Registry key: an account name within one role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OnlineKey {
    pub username: String,
    pub role: Role,
}

impl OnlineKey {
    /// Creates a key from its parts.
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    /// The key an authenticated account occupies.
    pub fn for_account(account: &Account) -> Self {
        Self::new(account.username.clone(), account.role)
    }
}

impl fmt::Display for OnlineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.username, self.role)
    }
}

/// Result of [`OnlineRegistry::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// The caller now holds the key (or already held it).
    Acquired,
    /// Another connection holds the key. Nothing was changed.
    AlreadyOwnedByOther(SocketAddr),
}

/// Process-wide map from [`OnlineKey`] to the owning connection's address.
///
/// Not persisted: after a restart every client logs in again.
#[derive(Debug, Default)]
pub struct OnlineRegistry {
    entries: Mutex<HashMap<OnlineKey, SocketAddr>>,
}

impl OnlineRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` for the connection at `addr`.
    ///
    /// Re-acquiring a key already held by the same address is idempotent.
    pub async fn try_acquire(&self, key: &OnlineKey, addr: SocketAddr) -> Acquire {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(owner) if *owner != addr => {
                tracing::info!(%key, %addr, holder = %owner, "duplicate login rejected");
                Acquire::AlreadyOwnedByOther(*owner)
            }
            Some(_) => Acquire::Acquired,
            None => {
                entries.insert(key.clone(), addr);
                tracing::info!(%key, %addr, "account online");
                Acquire::Acquired
            }
        }
    }

    /// Drops `key` if, and only if, it is still held by `addr`.
    ///
    /// Returns `true` if an entry was removed. A mismatch means a newer
    /// session owns the key, and it is left alone.
    pub async fn release(&self, key: &OnlineKey, addr: SocketAddr) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.get(key) == Some(&addr) {
            entries.remove(key);
            tracing::info!(%key, %addr, "account offline");
            true
        } else {
            false
        }
    }

    /// Returns the address currently holding `key`.
    pub async fn holder(&self, key: &OnlineKey) -> Option<SocketAddr> {
        self.entries.lock().await.get(key).copied()
    }

    /// Number of online identities.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns `true` if nobody is online.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn key(name: &str) -> OnlineKey {
        OnlineKey::new(name, Role::Player)
    }

    #[tokio::test]
    async fn test_try_acquire_free_key_succeeds() {
        let reg = OnlineRegistry::new();
        assert_eq!(reg.try_acquire(&key("p1"), addr(1)).await, Acquire::Acquired);
        assert_eq!(reg.holder(&key("p1")).await, Some(addr(1)));
    }

    #[tokio::test]
    async fn test_try_acquire_held_key_from_other_addr_is_rejected() {
        let reg = OnlineRegistry::new();
        reg.try_acquire(&key("p1"), addr(1)).await;

        let result = reg.try_acquire(&key("p1"), addr(2)).await;
        assert_eq!(result, Acquire::AlreadyOwnedByOther(addr(1)));
        // The original owner is untouched.
        assert_eq!(reg.holder(&key("p1")).await, Some(addr(1)));
    }

    #[tokio::test]
    async fn test_try_acquire_same_addr_is_idempotent() {
        let reg = OnlineRegistry::new();
        reg.try_acquire(&key("p1"), addr(1)).await;
        assert_eq!(reg.try_acquire(&key("p1"), addr(1)).await, Acquire::Acquired);
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn test_roles_are_separate_keys() {
        let reg = OnlineRegistry::new();
        let dev = OnlineKey::new("sam", Role::Developer);
        let player = OnlineKey::new("sam", Role::Player);
        assert_eq!(reg.try_acquire(&dev, addr(1)).await, Acquire::Acquired);
        assert_eq!(reg.try_acquire(&player, addr(2)).await, Acquire::Acquired);
    }

    #[tokio::test]
    async fn test_release_by_owner_frees_key() {
        let reg = OnlineRegistry::new();
        reg.try_acquire(&key("p1"), addr(1)).await;

        assert!(reg.release(&key("p1"), addr(1)).await);
        assert!(reg.is_empty().await);
        assert_eq!(reg.try_acquire(&key("p1"), addr(2)).await, Acquire::Acquired);
    }

    #[tokio::test]
    async fn test_release_by_non_owner_is_noop() {
        let reg = OnlineRegistry::new();
        reg.try_acquire(&key("p1"), addr(2)).await;

        assert!(!reg.release(&key("p1"), addr(1)).await);
        assert_eq!(reg.holder(&key("p1")).await, Some(addr(2)));
    }

    #[tokio::test]
    async fn test_release_unknown_key_is_noop() {
        let reg = OnlineRegistry::new();
        assert!(!reg.release(&key("ghost"), addr(1)).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_has_exactly_one_winner() {
        let reg = Arc::new(OnlineRegistry::new());
        let mut tasks = Vec::new();
        for port in 1..=32 {
            let reg = Arc::clone(&reg);
            tasks.push(tokio::spawn(async move {
                reg.try_acquire(&key("racer"), addr(port)).await
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() == Acquire::Acquired {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(reg.len().await, 1);
    }

    #[test]
    fn test_online_key_display() {
        assert_eq!(OnlineKey::new("d1", Role::Developer).to_string(), "d1:dev");
    }
}
