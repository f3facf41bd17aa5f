// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Maximum number of hearts (lives) a player can hold.
pub const MAX_HEARTS: u32 = 5;

/// Minimum percentage of correct answers for an attempt to count as a pass.
pub const PASSING_SCORE_PERCENTAGE: f64 = 80.0;

/// XP deducted immediately for every wrong answer during a quiz.
pub const WRONG_ANSWER_XP_PENALTY: u32 = 2;

/// The designated first level, always unlocked.
pub const FIRST_LEVEL: u32 = 1;

/// Failed deliveries after which a queued completion is dead-lettered.
pub const MAX_PUSH_ATTEMPTS: u32 = 20;

const DEFAULT_DATABASE_URL: &str = "sqlite://progress.db?mode=rwc";
const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite location of the local progress cache.
    pub database_url: String,
    /// Base URL of the progress backend.
    pub api_url: String,
    /// Optional bearer token attached to backend requests.
    pub api_token: Option<String>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("PROGRESS_DATABASE_URL")
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let api_url = env::var("PROGRESS_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let api_token = env::var("PROGRESS_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            api_url,
            api_token,
            rust_log,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            rust_log: "info".to_string(),
        }
    }
}
