//! Room registry: creates, tracks, and closes rooms.
//!
//! The registry is the only owner of rooms and, through them, of worker
//! processes. Every read-decide-mutate sequence runs under one lock:
//!
//! - port choice, worker spawn, and registration happen in one critical
//!   section, so two rooms can never claim the same port;
//! - a leave that empties a room removes it in the same critical section,
//!   so no join can slip into a room that is being torn down.
//!
//! The catalog is never called while the lock is held. Package lookup
//! happens before, play history is written after.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use arcade_catalog::{Catalog, CatalogError};
use arcade_protocol::{AccountId, GameId, RoomId, RoomListEntry};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::manifest::GameManifest;
use crate::worker::WorkerProcess;
use crate::{ports, staging, OrchestratorConfig, RoomError, RoomState};

/// One account in a room. Accounts are unique by id; the same username can
/// exist once per role.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Participant {
    id: AccountId,
    name: String,
}

/// An open room. Dropping it kills its worker.
#[derive(Debug)]
struct Room {
    id: RoomId,
    game_id: GameId,
    game_name: String,
    version: String,
    port: u16,
    host: String,
    /// Ordered, no duplicate ids, never empty while registered.
    participants: Vec<Participant>,
    state: RoomState,
    worker: WorkerProcess,
}

impl Room {
    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id,
            game_id: self.game_id,
            game_name: self.game_name.clone(),
            version: self.version.clone(),
            port: self.port,
            host: self.host.clone(),
            participants: self.participants.iter().map(|p| p.name.clone()).collect(),
            state: self.state,
            worker_pid: self.worker.pid(),
        }
    }

    /// Moves the room to `to`. An out-of-order transition is refused and
    /// logged.
    fn advance(&mut self, to: RoomState) -> bool {
        if !self.state.can_transition_to(to) {
            tracing::warn!(room_id = %self.id, from = %self.state, to = %to, "invalid room state transition");
            return false;
        }
        self.state = to;
        true
    }

    async fn close(mut self, grace: std::time::Duration) {
        if !self.advance(RoomState::Closed) {
            return;
        }
        tracing::info!(room_id = %self.id, port = self.port, game = %self.game_name, "room closed");
        self.worker.terminate(grace).await;
    }
}

/// A point-in-time copy of a room's public state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub game_id: GameId,
    pub game_name: String,
    /// Version the worker was started with.
    pub version: String,
    pub port: u16,
    pub host: String,
    /// Participant names in join order.
    pub participants: Vec<String>,
    pub state: RoomState,
    pub worker_pid: Option<u32>,
}

/// Returned by [`RoomRegistry::create_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTicket {
    pub room_id: RoomId,
    pub port: u16,
    pub game_name: String,
    pub version: String,
}

/// Returned by [`RoomRegistry::join_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTicket {
    pub room_id: RoomId,
    pub port: u16,
    pub game_name: String,
    pub game_id: GameId,
    pub version: String,
}

/// What [`RoomRegistry::leave_room`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The account is no longer a participant; others remain.
    Left,
    /// The last participant left. The room is gone and its worker stopped.
    Closed,
    /// No such room.
    NotFound,
}

#[derive(Debug, Default)]
struct RegistryState {
    rooms: BTreeMap<RoomId, Room>,
    next_id: u64,
}

/// Process-wide set of open rooms.
pub struct RoomRegistry {
    catalog: Arc<Catalog>,
    config: OrchestratorConfig,
    state: Mutex<RegistryState>,
}

impl RoomRegistry {
    /// Creates an empty registry that stages packages from `catalog`.
    pub fn new(catalog: Arc<Catalog>, config: OrchestratorConfig) -> Self {
        Self {
            catalog,
            config,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// The configuration this registry runs with.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Starts a worker for `game_id` and opens a room hosted by
    /// `account_name`.
    ///
    /// The room's version is the catalog's version at this moment and never
    /// changes afterwards. On any error no room is registered and no port
    /// stays claimed.
    ///
    /// # Errors
    /// - [`RoomError::GameNotFound`] / [`RoomError::Unpublished`]
    /// - [`RoomError::PackageMissing`], [`RoomError::Extract`],
    ///   [`RoomError::Manifest`], [`RoomError::Io`] while staging
    /// - [`RoomError::NoFreePorts`] when the port range is exhausted
    /// - [`RoomError::SpawnFailed`] if the worker cannot be started
    pub async fn create_room(
        &self,
        account_id: AccountId,
        account_name: &str,
        game_id: GameId,
    ) -> Result<RoomTicket, RoomError> {
        let package = self.catalog.package(game_id).await.map_err(|e| match e {
            CatalogError::GameNotFound(id) => RoomError::GameNotFound(id),
            other => RoomError::Io(std::io::Error::other(other.to_string())),
        })?;
        if !package.active {
            return Err(RoomError::Unpublished(game_id));
        }

        let dir = staging::stage(&self.config.staging_root, &package).await?;
        let manifest = GameManifest::load(&dir).await?;
        if let Some(declared) = manifest.version.as_deref() {
            if declared != package.version {
                tracing::warn!(
                    %game_id,
                    catalog = %package.version,
                    manifest = declared,
                    "manifest version differs from catalog version"
                );
            }
        }

        let ticket = {
            let mut state = self.state.lock().await;
            let claimed: HashSet<u16> = state.rooms.values().map(|r| r.port).collect();
            let port = ports::allocate(
                self.config.port_range.clone(),
                |p| claimed.contains(&p),
                &self.config.probe_host,
                self.config.probe_timeout,
            )
            .await
            .ok_or(RoomError::NoFreePorts)?;

            let worker = WorkerProcess::spawn(&manifest.server_command(port), &dir)?;

            state.next_id += 1;
            let room_id = RoomId(state.next_id);
            let mut room = Room {
                id: room_id,
                game_id,
                game_name: package.name.clone(),
                version: package.version.clone(),
                port,
                host: account_name.to_string(),
                participants: vec![Participant {
                    id: account_id,
                    name: account_name.to_string(),
                }],
                state: RoomState::Provisioning,
                worker,
            };
            if !room.advance(RoomState::Open) {
                return Err(RoomError::SpawnFailed(std::io::Error::other(
                    "room did not reach the open state",
                )));
            }
            state.rooms.insert(room_id, room);
            tracing::info!(%room_id, port, game = %package.name, version = %package.version, host = account_name, "room created");

            RoomTicket {
                room_id,
                port,
                game_name: package.name,
                version: package.version,
            }
        };

        self.catalog.record_play(account_id, game_id).await;
        Ok(ticket)
    }

    /// Open rooms in creation order.
    pub async fn list_rooms(&self) -> Vec<RoomListEntry> {
        let state = self.state.lock().await;
        state
            .rooms
            .values()
            .map(|r| RoomListEntry {
                id: r.id,
                game_name: r.game_name.clone(),
                host: r.host.clone(),
                players: r.participants.len(),
                port: r.port,
                version: r.version.clone(),
            })
            .collect()
    }

    /// Adds `account_id` to a room, shown as `account_name`. Joining a room
    /// one is already in succeeds without adding a duplicate.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`] if the room is not open.
    pub async fn join_room(
        &self,
        room_id: RoomId,
        account_id: AccountId,
        account_name: &str,
    ) -> Result<JoinTicket, RoomError> {
        let ticket = {
            let mut state = self.state.lock().await;
            let room = state
                .rooms
                .get_mut(&room_id)
                .filter(|r| r.state.is_joinable())
                .ok_or(RoomError::RoomNotFound(room_id))?;
            if !room.participants.iter().any(|p| p.id == account_id) {
                room.participants.push(Participant {
                    id: account_id,
                    name: account_name.to_string(),
                });
                tracing::info!(%room_id, player = account_name, players = room.participants.len(), "joined room");
            }
            JoinTicket {
                room_id,
                port: room.port,
                game_name: room.game_name.clone(),
                game_id: room.game_id,
                version: room.version.clone(),
            }
        };

        self.catalog.record_play(account_id, ticket.game_id).await;
        Ok(ticket)
    }

    /// Removes `account_id` from a room. Never fails.
    ///
    /// When the room becomes empty it is removed and its worker is
    /// terminated once the lock is released.
    pub async fn leave_room(&self, room_id: RoomId, account_id: AccountId) -> LeaveOutcome {
        let emptied = {
            let mut state = self.state.lock().await;
            let Some(room) = state.rooms.get_mut(&room_id) else {
                return LeaveOutcome::NotFound;
            };
            room.participants.retain(|p| p.id != account_id);
            if !room.participants.is_empty() {
                tracing::info!(%room_id, %account_id, players = room.participants.len(), "left room");
                return LeaveOutcome::Left;
            }
            state.rooms.remove(&room_id)
        };

        if let Some(room) = emptied {
            room.close(self.config.worker_grace).await;
        }
        LeaveOutcome::Closed
    }

    /// Returns `true` if any open room runs `game_id`.
    pub async fn is_game_running(&self, game_id: GameId) -> bool {
        let state = self.state.lock().await;
        state.rooms.values().any(|r| r.game_id == game_id)
    }

    /// Snapshot of one room.
    pub async fn room_of(&self, room_id: RoomId) -> Option<RoomSnapshot> {
        let state = self.state.lock().await;
        state.rooms.get(&room_id).map(Room::snapshot)
    }

    /// Number of open rooms.
    pub async fn room_count(&self) -> usize {
        self.state.lock().await.rooms.len()
    }

    /// Closes every room and waits for all workers to stop.
    pub async fn close_all(&self) {
        let rooms = std::mem::take(&mut self.state.lock().await.rooms);
        if rooms.is_empty() {
            return;
        }
        tracing::info!(count = rooms.len(), "closing all rooms");

        let grace = self.config.worker_grace;
        let mut closing = JoinSet::new();
        for room in rooms.into_values() {
            closing.spawn(room.close(grace));
        }
        while let Some(result) = closing.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "room close task failed");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    fn room(worker: WorkerProcess) -> Room {
        Room {
            id: RoomId(1),
            game_id: GameId(1),
            game_name: "Snake".into(),
            version: "1.0".into(),
            port: 9000,
            host: "host".into(),
            participants: vec![Participant {
                id: AccountId(1),
                name: "host".into(),
            }],
            state: RoomState::Provisioning,
            worker,
        }
    }

    #[tokio::test]
    async fn test_room_state_only_moves_forward() {
        let dir = tempfile::tempdir().unwrap();
        let worker = WorkerProcess::spawn("sleep 30", dir.path()).unwrap();
        let mut room = room(worker);

        assert!(!room.advance(RoomState::Closed));
        assert_eq!(room.state, RoomState::Provisioning);
        assert!(room.advance(RoomState::Open));
        assert!(!room.advance(RoomState::Provisioning));
        assert_eq!(room.snapshot().state, RoomState::Open);

        room.close(Duration::from_secs(2)).await;
    }
}
