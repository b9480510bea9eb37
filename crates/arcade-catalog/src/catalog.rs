//! The artifact catalog: published games and their package files.
//!
//! Metadata lives in memory behind one lock; package archives live as
//! files under the storage directory. Each mutating operation holds the
//! lock for its whole check-write-commit sequence, so two uploads of the
//! same name cannot both pass the name check.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use arcade_protocol::{
    Account, AccountId, DeveloperGame, GameId, GameSummary, PackageUpload,
};
use tokio::sync::Mutex;

use crate::review::{ReviewBook, ReviewSummary};
use crate::CatalogError;

/// A stored game artifact.
#[derive(Debug, Clone)]
struct GameRecord {
    id: GameId,
    name: String,
    version: String,
    description: String,
    owner: AccountId,
    owner_name: String,
    file_name: String,
    active: bool,
}

/// What `upload` did with an accepted package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
    /// A brand-new artifact.
    Created(GameId),
    /// An inactive artifact of the same owner was re-published under its
    /// old id.
    Resurrected(GameId),
}

impl Published {
    /// The artifact's id either way.
    pub fn game_id(self) -> GameId {
        match self {
            Self::Created(id) | Self::Resurrected(id) => id,
        }
    }
}

/// Everything the room orchestrator needs to stage a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub id: GameId,
    pub name: String,
    /// The catalog's current version; rooms snapshot this.
    pub version: String,
    /// Absolute or storage-relative path to the zip archive.
    pub path: PathBuf,
    pub active: bool,
}

/// A package read back for `download_game`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPackage {
    pub game_name: String,
    pub file_name: String,
    pub file_data: Vec<u8>,
}

#[derive(Debug, Default)]
struct CatalogState {
    games: BTreeMap<GameId, GameRecord>,
    next_id: u64,
    reviews: ReviewBook,
}

impl CatalogState {
    fn by_name(&self, name: &str) -> Option<&GameRecord> {
        self.games.values().find(|g| g.name == name)
    }

    fn allocate_id(&mut self) -> GameId {
        self.next_id += 1;
        GameId(self.next_id)
    }
}

/// Published games, package storage, play history, and reviews.
pub struct Catalog {
    storage_dir: PathBuf,
    state: Mutex<CatalogState>,
}

impl Catalog {
    /// Opens a catalog that stores packages under `storage_dir`, creating
    /// the directory if needed.
    ///
    /// # Errors
    /// [`CatalogError::Io`] if the directory cannot be created.
    pub async fn open(storage_dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let storage_dir = storage_dir.into();
        tokio::fs::create_dir_all(&storage_dir).await?;
        tracing::info!(dir = %storage_dir.display(), "catalog storage ready");
        Ok(Self {
            storage_dir,
            state: Mutex::new(CatalogState::default()),
        })
    }

    /// The package storage directory.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Publishes a new game, or re-publishes one of the owner's inactive
    /// games under its existing id.
    ///
    /// # Errors
    /// - [`CatalogError::MissingFields`] for an empty name, version, or package
    /// - [`CatalogError::NameTaken`] if another developer owns the name
    /// - [`CatalogError::AlreadyActive`] if the owner's game is still published
    /// - [`CatalogError::Io`] if the package cannot be written
    pub async fn upload(
        &self,
        owner: &Account,
        upload: PackageUpload,
    ) -> Result<Published, CatalogError> {
        validate_upload(&upload)?;
        let mut state = self.state.lock().await;

        let resurrect = match state.by_name(&upload.game_name) {
            Some(existing) if existing.owner != owner.id => {
                return Err(CatalogError::NameTaken(upload.game_name));
            }
            Some(existing) if existing.active => {
                return Err(CatalogError::AlreadyActive(upload.game_name));
            }
            Some(existing) => Some(existing.id),
            None => None,
        };

        let file_name = safe_filename(&upload.game_name, &upload.version);
        self.write_package(&file_name, &upload.file_data).await?;

        if let Some(id) = resurrect {
            if let Some(record) = state.games.get_mut(&id) {
                record.version = upload.version;
                record.description = upload.description;
                record.file_name = file_name;
                record.active = true;
                tracing::info!(game_id = %id, name = %record.name, version = %record.version, "game resurrected");
            }
            return Ok(Published::Resurrected(id));
        }

        let id = state.allocate_id();
        tracing::info!(game_id = %id, name = %upload.game_name, version = %upload.version, owner = %owner.username, "game published");
        state.games.insert(
            id,
            GameRecord {
                id,
                name: upload.game_name,
                version: upload.version,
                description: upload.description,
                owner: owner.id,
                owner_name: owner.username.clone(),
                file_name,
                active: true,
            },
        );
        Ok(Published::Created(id))
    }

    /// Replaces the package of one of the owner's games with a new version.
    ///
    /// The active flag is left as it is. Rooms already running keep the
    /// version they were started with.
    ///
    /// # Errors
    /// - [`CatalogError::MissingFields`] for an empty name, version, or package
    /// - [`CatalogError::NotOwnedByYou`] if the owner has no game of that name
    /// - [`CatalogError::SameVersion`] if the version does not change
    /// - [`CatalogError::Io`] if the package cannot be written
    pub async fn update(
        &self,
        owner: &Account,
        upload: PackageUpload,
    ) -> Result<GameId, CatalogError> {
        validate_upload(&upload)?;
        let mut state = self.state.lock().await;

        let (id, current) = match state.by_name(&upload.game_name) {
            Some(existing) if existing.owner == owner.id => {
                (existing.id, existing.version.clone())
            }
            _ => return Err(CatalogError::NotOwnedByYou(upload.game_name)),
        };
        if current == upload.version {
            return Err(CatalogError::SameVersion(upload.version));
        }

        let file_name = safe_filename(&upload.game_name, &upload.version);
        self.write_package(&file_name, &upload.file_data).await?;

        if let Some(record) = state.games.get_mut(&id) {
            tracing::info!(game_id = %id, from = %record.version, to = %upload.version, "game updated");
            record.version = upload.version;
            record.description = upload.description;
            record.file_name = file_name;
        }
        Ok(id)
    }

    /// Published games with their authors, in id order.
    pub async fn list_active(&self) -> Vec<GameSummary> {
        let state = self.state.lock().await;
        state
            .games
            .values()
            .filter(|g| g.active)
            .map(|g| GameSummary {
                id: g.id,
                name: g.name.clone(),
                version: g.version.clone(),
                description: g.description.clone(),
                author: g.owner_name.clone(),
            })
            .collect()
    }

    /// Every game owned by `owner`, unpublished ones included.
    pub async fn list_by_developer(&self, owner: AccountId) -> Vec<DeveloperGame> {
        let state = self.state.lock().await;
        state
            .games
            .values()
            .filter(|g| g.owner == owner)
            .map(|g| DeveloperGame {
                id: g.id,
                name: g.name.clone(),
                version: g.version.clone(),
                description: g.description.clone(),
                is_active: g.active,
            })
            .collect()
    }

    /// Returns `true` if `owner` owns `game_id`.
    pub async fn is_owner(&self, game_id: GameId, owner: AccountId) -> bool {
        let state = self.state.lock().await;
        state.games.get(&game_id).is_some_and(|g| g.owner == owner)
    }

    /// Publishes or withdraws a game.
    ///
    /// # Errors
    /// [`CatalogError::GameNotFound`] for an unknown id.
    pub async fn set_active(&self, game_id: GameId, active: bool) -> Result<(), CatalogError> {
        let mut state = self.state.lock().await;
        let record = state
            .games
            .get_mut(&game_id)
            .ok_or(CatalogError::GameNotFound(game_id))?;
        record.active = active;
        tracing::info!(%game_id, active, "game visibility changed");
        Ok(())
    }

    /// Looks up the current package of a game.
    ///
    /// # Errors
    /// [`CatalogError::GameNotFound`] for an unknown id.
    pub async fn package(&self, game_id: GameId) -> Result<PackageInfo, CatalogError> {
        let state = self.state.lock().await;
        let record = state
            .games
            .get(&game_id)
            .ok_or(CatalogError::GameNotFound(game_id))?;
        Ok(PackageInfo {
            id: record.id,
            name: record.name.clone(),
            version: record.version.clone(),
            path: self.storage_dir.join(&record.file_name),
            active: record.active,
        })
    }

    /// Reads a game's current package from storage.
    ///
    /// # Errors
    /// - [`CatalogError::GameNotFound`] for an unknown id
    /// - [`CatalogError::PackageMissing`] if the file is gone
    /// - [`CatalogError::Io`] if the file cannot be read
    pub async fn download(&self, game_id: GameId) -> Result<DownloadedPackage, CatalogError> {
        let (game_name, file_name) = {
            let state = self.state.lock().await;
            let record = state
                .games
                .get(&game_id)
                .ok_or(CatalogError::GameNotFound(game_id))?;
            (record.name.clone(), record.file_name.clone())
        };

        let path = self.storage_dir.join(&file_name);
        let file_data = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::PackageMissing(game_id));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(%game_id, bytes = file_data.len(), "package read");
        Ok(DownloadedPackage {
            game_name,
            file_name,
            file_data,
        })
    }

    /// Notes that `player` started or joined a room for `game_id`.
    pub async fn record_play(&self, player: AccountId, game_id: GameId) {
        let mut state = self.state.lock().await;
        if state.reviews.record_play(player, game_id) {
            tracing::debug!(%player, %game_id, "first play recorded");
        }
    }

    /// Returns `true` if `player` has ever played `game_id`.
    pub async fn has_played(&self, player: AccountId, game_id: GameId) -> bool {
        self.state.lock().await.reviews.has_played(player, game_id)
    }

    /// Adds a review. The rating is checked first, then the game, then
    /// the play history.
    ///
    /// # Errors
    /// - [`CatalogError::InvalidRating`] outside 1-5
    /// - [`CatalogError::GameNotFound`] for an unknown id
    /// - [`CatalogError::NotPlayed`] without a recorded play
    pub async fn add_review(
        &self,
        player: &Account,
        game_id: GameId,
        rating: i64,
        comment: &str,
    ) -> Result<(), CatalogError> {
        if !(crate::MIN_RATING..=crate::MAX_RATING).contains(&rating) {
            return Err(CatalogError::InvalidRating(rating));
        }
        let mut state = self.state.lock().await;
        if !state.games.contains_key(&game_id) {
            return Err(CatalogError::GameNotFound(game_id));
        }
        state
            .reviews
            .add(player.id, &player.username, game_id, rating, comment)?;
        tracing::info!(%game_id, player = %player.username, rating, "review added");
        Ok(())
    }

    /// Reviews for a game, newest first, with the rounded average.
    pub async fn reviews(&self, game_id: GameId) -> ReviewSummary {
        self.state.lock().await.reviews.summary(game_id)
    }

    async fn write_package(&self, file_name: &str, bytes: &[u8]) -> Result<(), CatalogError> {
        let path = self.storage_dir.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "package stored");
        Ok(())
    }
}

fn validate_upload(upload: &PackageUpload) -> Result<(), CatalogError> {
    if upload.game_name.trim().is_empty()
        || upload.version.trim().is_empty()
        || upload.file_data.is_empty()
    {
        return Err(CatalogError::MissingFields);
    }
    Ok(())
}

/// Storage file name for a package: [`package_stem`] plus `.zip`.
///
/// ```
/// assert_eq!(arcade_catalog::safe_filename("Snake", "1.0"), "Snake__1.0.zip");
/// ```
pub fn safe_filename(name: &str, version: &str) -> String {
    format!("{}.zip", package_stem(name, version))
}

/// File-system-safe `<name>__<version>` for a package.
///
/// ASCII alphanumerics, `.` and `-` are kept. Every other byte becomes `_`
/// followed by two hex digits, so an escaped part never contains `__` and
/// different (name, version) pairs never share a stem.
///
/// ```
/// use arcade_catalog::package_stem;
///
/// assert_eq!(package_stem("Snake 2", "1.0/b"), "Snake_202__1.0_2Fb");
/// assert_ne!(package_stem("a_b", "c"), package_stem("a", "b_c"));
/// ```
pub fn package_stem(name: &str, version: &str) -> String {
    format!("{}__{}", escape_part(name), escape_part(version))
}

fn escape_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02X}"));
        }
    }
    out
}
