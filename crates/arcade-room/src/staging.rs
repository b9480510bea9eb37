//! Extracting game packages into per-version working directories.
//!
//! Each (name, version) pair gets one directory under the staging root.
//! Extraction goes into a hidden sibling first and is renamed into place,
//! so a half-extracted directory is never visible under the final name.
//! Two stagers racing on the same version both extract, one rename wins,
//! and the loser reuses the winner's directory.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use arcade_catalog::PackageInfo;

use crate::RoomError;

/// Counter for unique temporary directory names within this process.
static NEXT_STAGING_SEQ: AtomicU64 = AtomicU64::new(1);

/// Staging directory name for a package. Same stem as the stored archive,
/// so distinct (name, version) pairs never share a directory.
pub fn staging_dir_name(name: &str, version: &str) -> String {
    arcade_catalog::package_stem(name, version)
}

/// Returns the staged directory for `package`, extracting it if needed.
///
/// # Errors
/// - [`RoomError::PackageMissing`] if the archive file does not exist
/// - [`RoomError::Extract`] if the archive cannot be read or unpacked
/// - [`RoomError::Io`] on other filesystem failures
pub async fn stage(staging_root: &Path, package: &PackageInfo) -> Result<PathBuf, RoomError> {
    let dir_name = staging_dir_name(&package.name, &package.version);
    let target = staging_root.join(&dir_name);
    if is_dir(&target).await {
        tracing::debug!(dir = %target.display(), "reusing staged package");
        return Ok(target);
    }

    if !tokio::fs::try_exists(&package.path).await? {
        return Err(RoomError::PackageMissing(package.id));
    }
    tokio::fs::create_dir_all(staging_root).await?;

    let seq = NEXT_STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    let temp = staging_root.join(format!(".{dir_name}.{}.{seq}.partial", std::process::id()));

    let archive = package.path.clone();
    let dest = temp.clone();
    let extracted = tokio::task::spawn_blocking(move || extract(&archive, &dest))
        .await
        .map_err(|e| RoomError::Extract(format!("extraction task failed: {e}")))
        .and_then(|result| result);
    if let Err(e) = extracted {
        remove_quietly(&temp).await;
        return Err(e);
    }

    match tokio::fs::rename(&temp, &target).await {
        Ok(()) => {
            tracing::info!(game = %package.name, version = %package.version, dir = %target.display(), "package staged");
            Ok(target)
        }
        Err(e) => {
            remove_quietly(&temp).await;
            if is_dir(&target).await {
                tracing::debug!(dir = %target.display(), "concurrent stager won, reusing");
                Ok(target)
            } else {
                Err(RoomError::Io(e))
            }
        }
    }
}

fn extract(archive: &Path, dest: &Path) -> Result<(), RoomError> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| RoomError::Extract(format!("{}: {e}", archive.display())))?;
    std::fs::create_dir_all(dest)?;
    zip.extract(dest)
        .map_err(|e| RoomError::Extract(format!("{}: {e}", archive.display())))
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %path.display(), error = %e, "failed to remove partial staging dir");
        }
    }
}
