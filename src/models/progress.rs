// src/models/progress.rs

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::MAX_HEARTS;

/// A single user's gamification state.
///
/// Owned by the `ProgressManager`; everything else only ever sees clones.
/// Fields are crate-private so that mutation has to go through the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    #[serde(rename = "totalXP")]
    pub(crate) total_xp: u32,

    /// Consecutive-day engagement counter.
    pub(crate) current_streak: u32,

    /// Depletable lives, always within `[0, MAX_HEARTS]`.
    pub(crate) hearts: u32,

    /// Levels passed at least once.
    pub(crate) completed_levels: BTreeSet<u32>,

    /// Frontier of accessible content. Never decreases.
    pub(crate) highest_unlocked_level: u32,

    pub(crate) last_activity_date: Option<NaiveDate>,

    /// Running quiz progress per level, as a percentage.
    /// Session-only state; it is never persisted or synced.
    #[serde(skip)]
    pub(crate) partial_progress: BTreeMap<u32, u8>,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            total_xp: 0,
            current_streak: 0,
            hearts: MAX_HEARTS,
            completed_levels: BTreeSet::new(),
            highest_unlocked_level: 0,
            last_activity_date: None,
            partial_progress: BTreeMap::new(),
        }
    }
}

impl UserProgress {
    /// Builds a progress record from raw values, normalizing it on the way in.
    pub fn from_parts(
        total_xp: u32,
        current_streak: u32,
        hearts: u32,
        completed_levels: impl IntoIterator<Item = u32>,
        highest_unlocked_level: u32,
        last_activity_date: Option<NaiveDate>,
    ) -> Self {
        let mut progress = Self {
            total_xp,
            current_streak,
            hearts,
            completed_levels: completed_levels.into_iter().collect(),
            highest_unlocked_level,
            last_activity_date,
            partial_progress: BTreeMap::new(),
        };
        progress.normalize();
        progress
    }

    pub fn total_xp(&self) -> u32 {
        self.total_xp
    }

    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    pub fn hearts(&self) -> u32 {
        self.hearts
    }

    pub fn completed_levels(&self) -> &BTreeSet<u32> {
        &self.completed_levels
    }

    pub fn highest_unlocked_level(&self) -> u32 {
        self.highest_unlocked_level
    }

    pub fn last_activity_date(&self) -> Option<NaiveDate> {
        self.last_activity_date
    }

    /// Restores the invariants after a hydrate from independently written keys.
    ///
    /// * `hearts` is clamped to `MAX_HEARTS`.
    /// * `highest_unlocked_level` covers every completed level.
    pub(crate) fn normalize(&mut self) {
        self.hearts = self.hearts.min(MAX_HEARTS);
        if let Some(&max_completed) = self.completed_levels.last() {
            self.highest_unlocked_level = self.highest_unlocked_level.max(max_completed);
        }
    }
}

/// The scored outcome of one quiz submission.
/// Consumed by `apply_completion` and then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelAttemptResult {
    pub level_number: u32,
    pub correct_count: u32,
    pub total_count: u32,
    pub xp_awarded: u32,
    pub passed: bool,
}
