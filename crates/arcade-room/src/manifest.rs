//! The game manifest, `game_config.json`, at the root of every package.
//!
//! ```json
//! {
//!   "server_cmd": "python3 server.py --port {port}",
//!   "exe_cmd": "python3 client.py --host {ip} --port {port}",
//!   "version": "1.2"
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::RoomError;

/// File name of the manifest inside a package.
pub const MANIFEST_FILE: &str = "game_config.json";

/// Placeholder in `server_cmd` replaced by the allocated port.
pub const PORT_PLACEHOLDER: &str = "{port}";

/// Launch instructions shipped inside a game package.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameManifest {
    /// Command that starts the game's server side.
    pub server_cmd: String,
    /// Command clients run; the server never uses it.
    #[serde(default)]
    pub exe_cmd: Option<String>,
    /// Version the developer wrote into the package.
    #[serde(default)]
    pub version: Option<String>,
}

impl GameManifest {
    /// Reads the manifest from a staged package directory.
    ///
    /// # Errors
    /// [`RoomError::Manifest`] if the file is missing, not valid JSON, or
    /// has an empty `server_cmd`.
    pub async fn load(dir: &Path) -> Result<Self, RoomError> {
        let path = dir.join(MANIFEST_FILE);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| RoomError::Manifest(format!("{}: {e}", path.display())))?;
        Self::parse(&bytes)
    }

    /// Parses manifest JSON.
    ///
    /// # Errors
    /// [`RoomError::Manifest`] on malformed JSON or an empty `server_cmd`.
    pub fn parse(bytes: &[u8]) -> Result<Self, RoomError> {
        let manifest: Self = serde_json::from_slice(bytes)
            .map_err(|e| RoomError::Manifest(format!("{MANIFEST_FILE}: {e}")))?;
        if manifest.server_cmd.trim().is_empty() {
            return Err(RoomError::Manifest(format!("{MANIFEST_FILE}: empty server_cmd")));
        }
        Ok(manifest)
    }

    /// The worker command line for `port`.
    pub fn server_command(&self, port: u16) -> String {
        self.server_cmd.replace(PORT_PLACEHOLDER, &port.to_string())
    }
}
