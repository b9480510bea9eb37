//! Artifact catalog for Arcade.
//!
//! Developers publish versioned zip packages; players list and download
//! them, and may review a game once they have played it.
//!
//! - [`Catalog`]: games, package storage, play history, reviews
//! - [`PackageInfo`]: what the room orchestrator stages
//! - [`safe_filename`] / [`package_stem`]: storage and staging names for packages
//!
//! Game names are unique across developers. A developer who unpublishes a
//! game and uploads it again gets the same id back ("resurrection").

mod catalog;
mod error;
mod review;

pub use catalog::{package_stem, safe_filename, Catalog, DownloadedPackage, PackageInfo, Published};
pub use error::CatalogError;
pub use review::{ReviewSummary, MAX_RATING, MIN_RATING};
