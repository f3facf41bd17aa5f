// src/manager.rs

use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{
    config::MAX_HEARTS,
    engine::{self, CompletionEffect, WrongAnswerPenalty},
    error::AppError,
    events::{EventBus, Subscription},
    models::{
        event::{ProgressEvent, ProgressEventKind},
        progress::{LevelAttemptResult, UserProgress},
        sync::{ProgressOverview, SaveProgressRequest},
    },
    store::{LocalStore, keys},
    sync::{ProgressApi, SyncCoordinator},
};

/// Source of "today" for streak bookkeeping.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

static GLOBAL: OnceLock<Arc<ProgressManager>> = OnceLock::new();

/// What a finished quiz did to the user's progress.
#[derive(Debug)]
pub struct CompletionOutcome {
    pub result: LevelAttemptResult,
    pub effect: CompletionEffect,
    /// Progress right after the local write.
    pub progress: UserProgress,
    /// Background push to the backend. Resolves to true when delivered;
    /// callers may simply drop it.
    pub sync_task: JoinHandle<bool>,
}

/// Owner of the single in-memory `UserProgress` of a session.
///
/// Every mutation runs under the state lock and writes through to the local
/// store before returning, so readers always see their own writes. Network
/// work happens outside the lock and never fails a mutation.
pub struct ProgressManager {
    state: Mutex<UserProgress>,
    store: LocalStore,
    sync: Arc<SyncCoordinator>,
    events: EventBus,
    clock: Clock,
}

impl ProgressManager {
    pub fn new(store: LocalStore, api: Arc<dyn ProgressApi>) -> Self {
        Self {
            state: Mutex::new(UserProgress::default()),
            sync: Arc::new(SyncCoordinator::new(api, store.clone())),
            store,
            events: EventBus::new(),
            clock: Arc::new(|| chrono::Local::now().date_naive()),
        }
    }

    /// Replaces the wall clock, for tests and replays.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Makes `manager` reachable through `ProgressManager::global()`.
    /// Fails with the rejected manager if one is already installed.
    pub fn install_global(manager: Arc<Self>) -> Result<(), Arc<Self>> {
        GLOBAL.set(manager)
    }

    pub fn global() -> Option<Arc<Self>> {
        GLOBAL.get().cloned()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn sync(&self) -> &Arc<SyncCoordinator> {
        &self.sync
    }

    /// Session start.
    ///
    /// * Flushes completions queued while offline, so the server record includes them.
    /// * Loads the server's progress; on success it overwrites the cached
    ///   frontier, completed levels and XP (server wins). Streak, hearts and
    ///   activity date are device-local and kept. Passed completions still
    ///   in the outbox are then re-applied on top, so they stay visible.
    /// * On any load failure, continues with the cached state.
    pub async fn init(&self) -> UserProgress {
        self.sync.flush_outbox().await;

        let mut progress = self.hydrate_local().await;
        match self.sync.load_authoritative().await {
            Some(remote) => {
                progress.highest_unlocked_level = remote.highest_level;
                progress.completed_levels = remote.completed_levels.into_iter().collect();
                progress.total_xp = remote.total_xp;
                progress.normalize();

                // Completions still queued are newer than the server's view.
                for entry in self.sync.pending_completions().await {
                    let req = &entry.request;
                    if req.passed {
                        engine::reapply_completion(&mut progress, req.level_id, req.xp_earned);
                    }
                }
                self.persist(&progress).await;
            }
            None => {
                tracing::info!("Starting session from local progress cache");
            }
        }

        let mut state = self.state.lock().await;
        *state = progress;
        state.clone()
    }

    /// Copy of the current progress.
    pub async fn snapshot(&self) -> UserProgress {
        self.state.lock().await.clone()
    }

    pub async fn is_level_unlocked(&self, level_number: u32) -> bool {
        engine::is_level_unlocked(&*self.state.lock().await, level_number)
    }

    pub async fn is_level_completed(&self, level_number: u32) -> bool {
        engine::is_level_completed(&*self.state.lock().await, level_number)
    }

    pub async fn level_completion_percentage(&self, level_number: u32) -> u8 {
        engine::level_completion_percentage(&*self.state.lock().await, level_number)
    }

    /// Per-question bookkeeping during a quiz.
    ///
    /// Updates the running share for `level_number` and, for a wrong answer,
    /// applies the XP and heart penalty immediately.
    pub async fn record_answer(
        &self,
        level_number: u32,
        correct: bool,
        answered: u32,
        total: u32,
    ) -> Option<WrongAnswerPenalty> {
        let mut state = self.state.lock().await;
        engine::record_partial_progress(&mut state, level_number, answered, total);
        if correct {
            return None;
        }

        let penalty = engine::apply_wrong_answer(&mut state);
        self.persist(&state).await;
        tracing::debug!(
            level_number,
            xp_deducted = penalty.xp_deducted,
            hearts = state.hearts,
            "Applied wrong answer penalty"
        );
        Some(penalty)
    }

    /// Scores a finished quiz and applies it.
    ///
    /// Locked levels and inconsistent counts are rejected without touching
    /// state. Otherwise the change is persisted locally, `levelCompleted` is
    /// emitted for passing attempts, and the push to the backend is spawned.
    pub async fn complete_level(
        &self,
        level_number: u32,
        correct_count: u32,
        total_count: u32,
        base_xp: u32,
    ) -> Result<CompletionOutcome, AppError> {
        if correct_count > total_count {
            return Err(AppError::InvalidAttempt(format!(
                "{} correct answers out of {} questions",
                correct_count, total_count
            )));
        }

        let result = engine::score_attempt(level_number, correct_count, total_count, base_xp);
        let today = (self.clock)();

        let (effect, progress) = {
            let mut state = self.state.lock().await;
            let effect = engine::apply_completion(&mut state, &result, today).map_err(|e| {
                tracing::warn!("Rejected completion of level {}: {}", level_number, e);
                e
            })?;
            self.persist(&state).await;
            (effect, state.clone())
        };

        tracing::info!(
            level_number,
            passed = result.passed,
            xp_credited = effect.xp_credited,
            total_xp = progress.total_xp,
            "Level attempt applied"
        );

        if result.passed {
            self.events.emit(&ProgressEvent::LevelCompleted {
                level_id: level_number,
                xp_earned: effect.xp_credited,
            });
        }

        let sync = self.sync.clone();
        let req = SaveProgressRequest::from_result(&result, effect.xp_credited);
        let sync_task = tokio::spawn(async move { sync.push_completion(req).await });

        Ok(CompletionOutcome {
            result,
            effect,
            progress,
            sync_task,
        })
    }

    pub async fn add_xp(&self, amount: u32) -> u32 {
        let mut state = self.state.lock().await;
        engine::add_xp(&mut state, amount);
        self.persist(&state).await;
        state.total_xp
    }

    /// Returns the XP actually removed; the total never goes below 0.
    pub async fn deduct_xp(&self, amount: u32) -> u32 {
        let mut state = self.state.lock().await;
        let deducted = engine::deduct_xp(&mut state, amount);
        self.persist(&state).await;
        deducted
    }

    pub async fn lose_heart(&self) -> u32 {
        let mut state = self.state.lock().await;
        if engine::lose_heart(&mut state) {
            self.persist(&state).await;
        }
        state.hearts
    }

    pub async fn gain_heart(&self) -> u32 {
        let mut state = self.state.lock().await;
        if engine::gain_heart(&mut state) {
            self.persist(&state).await;
        }
        state.hearts
    }

    pub async fn refill_hearts(&self) -> u32 {
        let mut state = self.state.lock().await;
        engine::refill_hearts(&mut state);
        self.persist(&state).await;
        state.hearts
    }

    pub async fn sound_enabled(&self) -> bool {
        self.store.read_field(keys::SOUND_ENABLED, true).await
    }

    pub async fn set_sound_enabled(&self, enabled: bool) {
        self.store.write_field(keys::SOUND_ENABLED, &enabled).await;
    }

    pub async fn overview(&self) -> Result<ProgressOverview, AppError> {
        self.sync.fetch_overview().await
    }

    #[must_use = "dropping the Subscription unsubscribes the handler immediately"]
    pub fn subscribe<F>(&self, kind: ProgressEventKind, handler: F) -> Subscription
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(kind, handler)
    }

    /// Reads the cached progress, field by field, repairing torn writes.
    async fn hydrate_local(&self) -> UserProgress {
        let completed: Vec<u32> = self.store.read_field(keys::COMPLETED_LEVELS, Vec::new()).await;

        UserProgress::from_parts(
            self.store.read_field(keys::TOTAL_XP, 0).await,
            self.store.read_field(keys::CURRENT_STREAK, 0).await,
            self.store.read_field(keys::HEARTS, MAX_HEARTS).await,
            completed,
            self.store.read_field(keys::HIGHEST_UNLOCKED_LEVEL, 0).await,
            self.store.read_field(keys::LAST_ACTIVITY_DATE, None).await,
        )
    }

    async fn persist(&self, progress: &UserProgress) {
        self.store.write_field(keys::TOTAL_XP, &progress.total_xp).await;
        self.store.write_field(keys::COMPLETED_LEVELS, &progress.completed_levels).await;
        self.store
            .write_field(keys::HIGHEST_UNLOCKED_LEVEL, &progress.highest_unlocked_level)
            .await;
        self.store.write_field(keys::CURRENT_STREAK, &progress.current_streak).await;
        self.store.write_field(keys::HEARTS, &progress.hearts).await;
        self.store
            .write_field(keys::LAST_ACTIVITY_DATE, &progress.last_activity_date)
            .await;
    }
}
