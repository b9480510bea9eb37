//! Room orchestration for Arcade.
//!
//! A room is a short-lived multiplayer session backed by one worker
//! process: the game's own server, started from its package on a port the
//! registry picks. Creating a room stages the package, reads its manifest,
//! claims a port, and spawns the worker. The last participant to leave
//! closes the room and stops the worker.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: create, join, leave, list; owns every worker
//! - [`OrchestratorConfig`]: staging root, port range, probe and grace timing
//! - [`GameManifest`]: `game_config.json` inside each package
//! - [`WorkerProcess`]: one running game server
//! - [`RoomState`]: lifecycle state machine

mod config;
mod error;
mod manifest;
mod ports;
mod registry;
pub mod staging;
mod worker;

pub use config::{OrchestratorConfig, RoomState};
pub use error::RoomError;
pub use manifest::{GameManifest, MANIFEST_FILE, PORT_PLACEHOLDER};
pub use registry::{JoinTicket, LeaveOutcome, RoomRegistry, RoomSnapshot, RoomTicket};
pub use worker::WorkerProcess;
