// src/models/event.rs

use serde::{Deserialize, Serialize};

/// Names of the events published on the notification bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressEventKind {
    LevelCompleted,
}

impl ProgressEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressEventKind::LevelCompleted => "levelCompleted",
        }
    }
}

/// Payloads broadcast to UI surfaces after engine state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgressEvent {
    #[serde(rename_all = "camelCase")]
    LevelCompleted { level_id: u32, xp_earned: u32 },
}

impl ProgressEvent {
    pub fn kind(&self) -> ProgressEventKind {
        match self {
            ProgressEvent::LevelCompleted { .. } => ProgressEventKind::LevelCompleted,
        }
    }
}
