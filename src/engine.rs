// src/engine.rs

//! Unlock and award rules.
//!
//! Stateless functions over a `UserProgress`. Read-only helpers take `&UserProgress`,
//! transitions take `&mut UserProgress` and clamp every scalar they touch.

use chrono::NaiveDate;

use crate::{
    config::{FIRST_LEVEL, MAX_HEARTS, PASSING_SCORE_PERCENTAGE, WRONG_ANSWER_XP_PENALTY},
    error::AppError,
    models::progress::{LevelAttemptResult, UserProgress},
};

/// What `apply_completion` actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEffect {
    /// XP credited to `total_xp`. Zero for failed attempts and replays.
    pub xp_credited: u32,
    /// True when the level entered `completed_levels` with this call.
    pub first_completion: bool,
    /// Set when the unlock frontier advanced.
    pub unlocked_level: Option<u32>,
}

/// Result of one wrong answer during a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrongAnswerPenalty {
    pub xp_deducted: u32,
    pub heart_lost: bool,
}

/// A level is unlocked iff it is at most one past the frontier.
/// The first level is always unlocked.
pub fn is_level_unlocked(progress: &UserProgress, level_number: u32) -> bool {
    level_number <= FIRST_LEVEL
        || level_number <= progress.highest_unlocked_level.saturating_add(1)
}

pub fn is_level_completed(progress: &UserProgress, level_number: u32) -> bool {
    progress.completed_levels.contains(&level_number)
}

/// Display value in `0..=100`.
///
/// 100 iff the level is completed. Otherwise the running quiz share if one is
/// tracked (capped at 99), else 0.
pub fn level_completion_percentage(progress: &UserProgress, level_number: u32) -> u8 {
    if is_level_completed(progress, level_number) {
        return 100;
    }
    progress
        .partial_progress
        .get(&level_number)
        .copied()
        .unwrap_or(0)
        .min(99)
}

/// Scores a quiz submission.
///
/// Passes at `PASSING_SCORE_PERCENTAGE` or above; the tie passes.
/// An empty quiz (`total_count == 0`) never passes.
/// `correct_count` is clamped to `total_count`.
pub fn score_attempt(
    level_number: u32,
    correct_count: u32,
    total_count: u32,
    base_xp: u32,
) -> LevelAttemptResult {
    let correct_count = correct_count.min(total_count);

    let passed = if total_count == 0 {
        false
    } else {
        let percentage = correct_count as f64 * 100.0 / total_count as f64;
        percentage >= PASSING_SCORE_PERCENTAGE
    };

    LevelAttemptResult {
        level_number,
        correct_count,
        total_count,
        xp_awarded: if passed { base_xp } else { 0 },
        passed,
    }
}

/// Streak after activity on `today`.
///
/// * never active before: 1
/// * same day (or a clock that moved backwards): unchanged, at least 1
/// * yesterday: +1
/// * a gap of two or more days: reset to 1
pub fn update_streak(last_activity: Option<NaiveDate>, today: NaiveDate, current_streak: u32) -> u32 {
    let Some(last) = last_activity else {
        return 1;
    };

    match (today - last).num_days() {
        ..=0 => current_streak.max(1),
        1 => current_streak.saturating_add(1),
        _ => 1,
    }
}

/// Applies a scored attempt to the progress record.
///
/// Rejects levels below `FIRST_LEVEL` and locked levels without touching state.
/// A failed attempt only clears the running quiz share; its penalties were
/// already applied per question through `apply_wrong_answer`.
///
/// A passing attempt on an already completed level is a replay: streak and
/// activity date move, but no XP is credited a second time.
pub fn apply_completion(
    progress: &mut UserProgress,
    result: &LevelAttemptResult,
    today: NaiveDate,
) -> Result<CompletionEffect, AppError> {
    let level = result.level_number;

    if level < FIRST_LEVEL {
        return Err(AppError::InvalidAttempt(format!(
            "level numbers start at {}, got {}",
            FIRST_LEVEL, level
        )));
    }

    if !is_level_unlocked(progress, level) {
        return Err(AppError::LevelLocked {
            level,
            highest_unlocked: progress.highest_unlocked_level,
        });
    }

    progress.partial_progress.remove(&level);

    if !result.passed {
        return Ok(CompletionEffect {
            xp_credited: 0,
            first_completion: false,
            unlocked_level: None,
        });
    }

    let first_completion = progress.completed_levels.insert(level);
    let xp_credited = if first_completion { result.xp_awarded } else { 0 };
    progress.total_xp = progress.total_xp.saturating_add(xp_credited);

    let unlocked_level = if level == progress.highest_unlocked_level.saturating_add(1) {
        progress.highest_unlocked_level = level;
        Some(level)
    } else {
        None
    };

    progress.current_streak =
        update_streak(progress.last_activity_date, today, progress.current_streak);
    progress.last_activity_date = Some(today);

    Ok(CompletionEffect {
        xp_credited,
        first_completion,
        unlocked_level,
    })
}

/// Folds a passed completion the server has not seen yet into loaded progress.
///
/// Credits `xp_earned` only when the level was not already completed and never
/// lowers the frontier. Streak and activity date were already settled locally.
pub fn reapply_completion(progress: &mut UserProgress, level_number: u32, xp_earned: u32) -> bool {
    if level_number < FIRST_LEVEL {
        return false;
    }
    let first_completion = progress.completed_levels.insert(level_number);
    if first_completion {
        progress.total_xp = progress.total_xp.saturating_add(xp_earned);
    }
    progress.highest_unlocked_level = progress.highest_unlocked_level.max(level_number);
    progress.partial_progress.remove(&level_number);
    first_completion
}

/// Per-question penalty: `WRONG_ANSWER_XP_PENALTY` XP and one heart, both clamped at 0.
pub fn apply_wrong_answer(progress: &mut UserProgress) -> WrongAnswerPenalty {
    WrongAnswerPenalty {
        xp_deducted: deduct_xp(progress, WRONG_ANSWER_XP_PENALTY),
        heart_lost: lose_heart(progress),
    }
}

/// Records how far the running quiz for `level_number` has got.
pub fn record_partial_progress(progress: &mut UserProgress, level_number: u32, answered: u32, total: u32) {
    if total == 0 || is_level_completed(progress, level_number) {
        return;
    }
    let percentage = (answered.min(total) as u64 * 100 / total as u64).min(99) as u8;
    progress.partial_progress.insert(level_number, percentage);
}

pub fn add_xp(progress: &mut UserProgress, amount: u32) {
    progress.total_xp = progress.total_xp.saturating_add(amount);
}

/// Deducts up to `amount` XP and returns how much was actually removed.
pub fn deduct_xp(progress: &mut UserProgress, amount: u32) -> u32 {
    let deducted = amount.min(progress.total_xp);
    progress.total_xp -= deducted;
    deducted
}

/// Returns false when there was no heart left to lose.
pub fn lose_heart(progress: &mut UserProgress) -> bool {
    if progress.hearts == 0 {
        return false;
    }
    progress.hearts -= 1;
    true
}

/// Returns false when hearts were already full.
pub fn gain_heart(progress: &mut UserProgress) -> bool {
    if progress.hearts >= MAX_HEARTS {
        progress.hearts = MAX_HEARTS;
        return false;
    }
    progress.hearts += 1;
    true
}

pub fn refill_hearts(progress: &mut UserProgress) {
    progress.hearts = MAX_HEARTS;
}
