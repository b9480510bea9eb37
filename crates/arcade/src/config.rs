//! Server configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! { "bind_addr": "0.0.0.0:9999", "port_range_start": 12000, "port_range_end": 12050 }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use arcade_room::OrchestratorConfig;
use arcade_transport::DEFAULT_MAX_FRAME_LEN;
use serde::{Deserialize, Serialize};

use crate::ArcadeError;

/// Settings for one server instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the client listener binds to.
    pub bind_addr: String,

    /// Root for package storage and staged games.
    pub data_dir: PathBuf,

    /// First port handed to game workers.
    pub port_range_start: u16,

    /// One past the last port handed to game workers.
    pub port_range_end: u16,

    /// Host probed before a port is handed out.
    pub probe_host: String,

    pub probe_timeout_ms: u64,

    /// Time a worker gets between SIGTERM and a hard kill.
    pub worker_grace_ms: u64,

    /// A connection silent for this long is closed. 0 disables the limit.
    pub idle_timeout_secs: u64,

    /// Largest frame accepted from a client, in bytes.
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8888".to_string(),
            data_dir: PathBuf::from("data"),
            port_range_start: 9000,
            port_range_end: 9100,
            probe_host: "127.0.0.1".to_string(),
            probe_timeout_ms: 200,
            worker_grace_ms: 3000,
            idle_timeout_secs: 300,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ServerConfig {
    /// Parses a JSON config document.
    ///
    /// # Errors
    /// [`ArcadeError::Config`] on malformed JSON or invalid values.
    pub fn from_json(text: &str) -> Result<Self, ArcadeError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ArcadeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    /// [`ArcadeError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ArcadeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ArcadeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Checks values serde cannot check.
    ///
    /// # Errors
    /// [`ArcadeError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ArcadeError> {
        if self.port_range_start >= self.port_range_end {
            return Err(ArcadeError::Config(format!(
                "empty worker port range {}..{}",
                self.port_range_start, self.port_range_end
            )));
        }
        if self.max_frame_len == 0 {
            return Err(ArcadeError::Config("max_frame_len must be positive".into()));
        }
        Ok(())
    }

    /// Where uploaded packages are stored.
    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage").join("games")
    }

    /// Where packages are extracted for running workers.
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("running_games")
    }

    /// The idle limit, or `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Room orchestrator settings derived from this config.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            staging_root: self.staging_dir(),
            port_range: self.port_range_start..self.port_range_end,
            probe_host: self.probe_host.clone(),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            worker_grace: Duration::from_millis(self.worker_grace_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8888");
        assert_eq!(config.storage_dir(), PathBuf::from("data/storage/games"));
        assert_eq!(config.staging_dir(), PathBuf::from("data/running_games"));
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.max_frame_len, 16 * 1024 * 1024);
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config = ServerConfig::from_json(
            r#"{"bind_addr":"127.0.0.1:7000","port_range_start":12000,"port_range_end":12010}"#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:7000");
        assert_eq!(config.orchestrator().port_range, 12000..12010);
        assert_eq!(config.worker_grace_ms, 3000);
    }

    #[test]
    fn test_empty_port_range_rejected() {
        let result = ServerConfig::from_json(r#"{"port_range_start":9100,"port_range_end":9100}"#);
        assert!(matches!(result, Err(ArcadeError::Config(_))));
    }

    #[test]
    fn test_zero_idle_timeout_disables_limit() {
        let config = ServerConfig {
            idle_timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn test_from_file_missing() {
        let result = ServerConfig::from_file(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(ArcadeError::Config(_))));
    }
}
