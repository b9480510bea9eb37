//! Orchestrator configuration and the room state machine.

use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

/// Settings for staging packages and running game workers.
///
/// Override individual fields with struct update syntax:
///
/// ```
/// use arcade_room::OrchestratorConfig;
///
/// let config = OrchestratorConfig {
///     port_range: 12000..12010,
///     ..OrchestratorConfig::default()
/// };
/// assert_eq!(config.port_range.len(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory that holds one extracted copy per game version.
    pub staging_root: PathBuf,

    /// Ports handed to workers, end exclusive.
    pub port_range: Range<u16>,

    /// Host probed to see whether something outside the registry already
    /// listens on a candidate port.
    pub probe_host: String,

    /// How long a probe connect may take before the port counts as free.
    pub probe_timeout: Duration,

    /// How long a worker gets to exit after SIGTERM before it is killed.
    pub worker_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            staging_root: PathBuf::from("data/running_games"),
            port_range: 9000..9100,
            probe_host: "127.0.0.1".to_string(),
            probe_timeout: Duration::from_millis(200),
            worker_grace: Duration::from_secs(3),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Provisioning → Open → Closed
/// ```
///
/// - **Provisioning**: package staged, port being claimed, worker being
///   spawned. Never visible outside the registry.
/// - **Open**: registered, listed, joinable. At least one participant.
/// - **Closed**: last participant left or the server is shutting down.
///   The room is gone from the registry and its worker is terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Provisioning,
    Open,
    Closed,
}

impl RoomState {
    /// Returns `true` if the room accepts joins.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if transitioning to `target` is valid. States only
    /// move forward, one step at a time.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Provisioning, Self::Open) | (Self::Open, Self::Closed)
        )
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provisioning => write!(f, "Provisioning"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
