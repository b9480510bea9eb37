//! Play history and reviews.
//!
//! A player may review a game only after creating or joining a room for
//! it. Reviews are kept per game in insertion order and listed newest
//! first.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use arcade_protocol::{AccountId, GameId, ReviewEntry};

use crate::CatalogError;

/// Lowest accepted rating.
pub const MIN_RATING: i64 = 1;
/// Highest accepted rating.
pub const MAX_RATING: i64 = 5;

/// Reviews for one game plus their average, as listed to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSummary {
    /// Newest first.
    pub reviews: Vec<ReviewEntry>,
    /// Mean rating rounded to one decimal; `0.0` without reviews.
    pub average_rating: f64,
}

#[derive(Debug, Default)]
pub(crate) struct ReviewBook {
    plays: HashSet<(AccountId, GameId)>,
    reviews: HashMap<GameId, Vec<ReviewEntry>>,
}

impl ReviewBook {
    /// Returns `true` if this is the first recorded play.
    pub(crate) fn record_play(&mut self, player: AccountId, game_id: GameId) -> bool {
        self.plays.insert((player, game_id))
    }

    pub(crate) fn has_played(&self, player: AccountId, game_id: GameId) -> bool {
        self.plays.contains(&(player, game_id))
    }

    pub(crate) fn add(
        &mut self,
        player: AccountId,
        player_name: &str,
        game_id: GameId,
        rating: i64,
        comment: &str,
    ) -> Result<(), CatalogError> {
        let rating = validate_rating(rating)?;
        if !self.has_played(player, game_id) {
            return Err(CatalogError::NotPlayed);
        }
        self.reviews.entry(game_id).or_default().push(ReviewEntry {
            rating,
            comment: comment.to_string(),
            player: player_name.to_string(),
            date: unix_now(),
        });
        Ok(())
    }

    pub(crate) fn summary(&self, game_id: GameId) -> ReviewSummary {
        let reviews: Vec<ReviewEntry> = self
            .reviews
            .get(&game_id)
            .map(|list| list.iter().rev().cloned().collect())
            .unwrap_or_default();
        let average_rating = average(&reviews);
        ReviewSummary {
            reviews,
            average_rating,
        }
    }
}

fn validate_rating(rating: i64) -> Result<u8, CatalogError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(CatalogError::InvalidRating(rating));
    }
    u8::try_from(rating).map_err(|_| CatalogError::InvalidRating(rating))
}

fn average(reviews: &[ReviewEntry]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    let mean = f64::from(sum) / reviews.len() as f64;
    (mean * 10.0).round() / 10.0
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
