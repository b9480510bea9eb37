//! Account directory: registration and credential checks.
//!
//! The broker does not own credential storage. It talks to an
//! [`AccountDirectory`] through two narrow operations and never looks at
//! how passwords are kept. [`InMemoryAccounts`] is the implementation the
//! server ships with; a database-backed directory only has to implement the
//! same trait.

use std::collections::HashMap;
use std::future::Future;

use arcade_protocol::{Account, AccountId, Role};
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::SessionError;

/// Verifies credentials and registers new accounts.
///
/// The methods return `Send` futures so a directory can be awaited from
/// connection tasks spawned on the multi-threaded runtime. Implementors
/// may still write them as `async fn`.
pub trait AccountDirectory: Send + Sync + 'static {
    /// Creates an account. Usernames are unique per role.
    ///
    /// # Errors
    /// - [`SessionError::MissingFields`] for an empty username or password
    /// - [`SessionError::UsernameTaken`] if the name exists for this role
    fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> impl Future<Output = Result<AccountId, SessionError>> + Send;

    /// Checks credentials for the given role and returns the account.
    ///
    /// # Errors
    /// - [`SessionError::MissingFields`] for an empty username or password
    /// - [`SessionError::InvalidCredentials`] otherwise
    fn verify(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> impl Future<Output = Result<Account, SessionError>> + Send;
}

struct StoredAccount {
    id: AccountId,
    salt: [u8; 16],
    digest: [u8; 32],
}

#[derive(Default)]
struct Directory {
    accounts: HashMap<(String, Role), StoredAccount>,
    next_id: u64,
}

/// A process-local [`AccountDirectory`].
///
/// Passwords are stored as a salted SHA-256 digest. Contents are lost on
/// restart.
#[derive(Default)]
pub struct InMemoryAccounts {
    inner: Mutex<Directory>,
}

impl InMemoryAccounts {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered accounts across both roles.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.accounts.len()
    }

    /// Returns `true` if no account has been registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.accounts.is_empty()
    }
}

impl AccountDirectory for InMemoryAccounts {
    async fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<AccountId, SessionError> {
        if username.is_empty() || password.is_empty() {
            return Err(SessionError::MissingFields);
        }

        let salt: [u8; 16] = rand::rng().random();
        let digest = digest(&salt, password);

        let mut dir = self.inner.lock().await;
        let key = (username.to_string(), role);
        if dir.accounts.contains_key(&key) {
            return Err(SessionError::UsernameTaken);
        }

        dir.next_id += 1;
        let id = AccountId(dir.next_id);
        dir.accounts.insert(key, StoredAccount { id, salt, digest });

        tracing::info!(%id, username, %role, "account registered");
        Ok(id)
    }

    async fn verify(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Account, SessionError> {
        if username.is_empty() || password.is_empty() {
            return Err(SessionError::MissingFields);
        }

        let dir = self.inner.lock().await;
        let stored = dir
            .accounts
            .get(&(username.to_string(), role))
            .ok_or(SessionError::InvalidCredentials)?;

        if digest(&stored.salt, password) != stored.digest {
            return Err(SessionError::InvalidCredentials);
        }

        Ok(Account {
            id: stored.id,
            username: username.to_string(),
            role,
        })
    }
}

fn digest(salt: &[u8; 16], password: &str) -> [u8; 32] {
    Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_then_verify_returns_account() {
        let dir = InMemoryAccounts::new();
        let id = dir.register("alice", "pw", Role::Player).await.unwrap();

        let account = dir.verify("alice", "pw", Role::Player).await.unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.username, "alice");
        assert_eq!(account.role, Role::Player);
    }

    #[tokio::test]
    async fn test_verify_wrong_password_fails() {
        let dir = InMemoryAccounts::new();
        dir.register("alice", "pw", Role::Player).await.unwrap();

        let result = dir.verify("alice", "nope", Role::Player).await;
        assert!(matches!(result, Err(SessionError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_verify_wrong_role_fails() {
        let dir = InMemoryAccounts::new();
        dir.register("alice", "pw", Role::Player).await.unwrap();

        let result = dir.verify("alice", "pw", Role::Developer).await;
        assert!(matches!(result, Err(SessionError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_register_duplicate_name_same_role_fails() {
        let dir = InMemoryAccounts::new();
        dir.register("bob", "pw", Role::Developer).await.unwrap();

        let result = dir.register("bob", "other", Role::Developer).await;
        assert!(matches!(result, Err(SessionError::UsernameTaken)));
    }

    #[tokio::test]
    async fn test_same_name_in_both_roles_are_distinct_accounts() {
        let dir = InMemoryAccounts::new();
        let dev = dir.register("bob", "pw", Role::Developer).await.unwrap();
        let player = dir.register("bob", "pw", Role::Player).await.unwrap();
        assert_ne!(dev, player);
        assert_eq!(dir.len().await, 2);
    }

    #[tokio::test]
    async fn test_empty_fields_are_rejected() {
        let dir = InMemoryAccounts::new();
        assert!(matches!(
            dir.register("", "pw", Role::Player).await,
            Err(SessionError::MissingFields)
        ));
        assert!(matches!(
            dir.verify("alice", "", Role::Player).await,
            Err(SessionError::MissingFields)
        ));
        assert!(dir.is_empty().await);
    }

    #[test]
    fn test_digest_depends_on_salt() {
        assert_ne!(digest(&[0; 16], "pw"), digest(&[1; 16], "pw"));
    }
}
