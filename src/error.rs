// src/error.rs

use std::fmt;

/// Global Application Error Enum.
/// Centralizes the failure modes of the progress engine.
///
/// Only `LevelLocked` and `InvalidAttempt` ever reach gameplay callers.
/// Storage and network variants are produced by the lower layers and are
/// logged and degraded by the manager instead of being propagated.
#[derive(Debug)]
pub enum AppError {
    /// Attempted to complete a level beyond the unlock frontier.
    LevelLocked { level: u32, highest_unlocked: u32 },

    /// Malformed attempt input or an operation called in the wrong quiz phase.
    InvalidAttempt(String),

    // Local persistence failure (SQLite, migrations)
    Storage(String),

    // Transport failure, 5xx, 408 or 429 from the backend; worth retrying
    Network(String),

    /// The backend refused the request with a 4xx; resending it cannot succeed.
    Rejected { status: u16, message: String },

    // Payload could not be (de)serialized
    Decode(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::LevelLocked {
                level,
                highest_unlocked,
            } => write!(
                f,
                "level {} is locked (highest unlocked level is {})",
                level, highest_unlocked
            ),
            AppError::InvalidAttempt(msg) => write!(f, "invalid attempt: {}", msg),
            AppError::Storage(msg) => write!(f, "storage error: {}", msg),
            AppError::Network(msg) => write!(f, "network error: {}", msg),
            AppError::Rejected { status, message } => {
                write!(f, "rejected by backend ({}): {}", status, message)
            }
            AppError::Decode(msg) => write!(f, "decode error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// True when retrying the same request is pointless.
    pub fn is_permanent(&self) -> bool {
        matches!(self, AppError::Rejected { .. })
    }
}

/// Converts `sqlx::Error` into `AppError::Storage`.
/// Allows using `?` operator on store queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(err.to_string())
    }
}

/// Body decoding failures map to `Decode`, client errors other than 408/429
/// to `Rejected`, everything else to `Network`.
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return AppError::Decode(err.to_string());
        }
        match err.status() {
            Some(status)
                if status.is_client_error()
                    && status != reqwest::StatusCode::REQUEST_TIMEOUT
                    && status != reqwest::StatusCode::TOO_MANY_REQUESTS =>
            {
                AppError::Rejected {
                    status: status.as_u16(),
                    message: err.to_string(),
                }
            }
            _ => AppError::Network(err.to_string()),
        }
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidAttempt(err.to_string())
    }
}
