// src/models/sync.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::progress::LevelAttemptResult;

/// Response of `GET /api/progress/load/`.
/// The server's view of the user's progress, authoritative at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProgressResponse {
    pub highest_level: u32,
    #[serde(default)]
    pub completed_levels: Vec<u32>,
    #[serde(default)]
    pub total_xp: u32,
}

/// DTO for `POST /api/progress/save/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_score))]
pub struct SaveProgressRequest {
    #[validate(range(min = 1, message = "Level ids start at 1"))]
    pub level_id: u32,
    pub score: u32,
    pub total: u32,
    pub xp_earned: u32,
    pub passed: bool,
}

fn validate_score(req: &SaveProgressRequest) -> Result<(), validator::ValidationError> {
    if req.score > req.total {
        return Err(validator::ValidationError::new("score_exceeds_total"));
    }
    Ok(())
}

impl SaveProgressRequest {
    /// Builds the save payload for a scored attempt.
    /// `xp_earned` is what was actually credited locally, which is 0 on a replay.
    pub fn from_result(result: &LevelAttemptResult, xp_earned: u32) -> Self {
        Self {
            level_id: result.level_number,
            score: result.correct_count,
            total: result.total_count,
            xp_earned,
            passed: result.passed,
        }
    }
}

/// A completion that could not be pushed yet, kept in the durable outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCompletion {
    pub request: SaveProgressRequest,
    pub queued_at: chrono::DateTime<chrono::Utc>,
    /// Number of failed deliveries so far.
    pub attempts: u32,
}

/// Response of `GET /api/progress/overview/`, consumed read-only by dashboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressOverview {
    #[serde(default)]
    pub weekly_xp: u32,
    #[serde(default)]
    pub monthly_xp: u32,
    /// Share of correct answers, 0..=100.
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub total_xp: u32,
    #[serde(default)]
    pub levels_completed: u32,
}
