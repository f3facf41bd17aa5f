// src/models/mod.rs

pub mod event;
pub mod progress;
pub mod sync;
