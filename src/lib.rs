// src/lib.rs

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod manager;
pub mod models;
pub mod session;
pub mod state;
pub mod store;
pub mod sync;

// Re-export specific items for convenience
pub use error::AppError;
pub use manager::ProgressManager;
