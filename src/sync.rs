// src/sync.rs

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use tokio::sync::Mutex;
use url::Url;
use validator::Validate;

use crate::{
    config::{Config, MAX_PUSH_ATTEMPTS},
    error::AppError,
    models::sync::{LoadProgressResponse, PendingCompletion, ProgressOverview, SaveProgressRequest},
    store::{LocalStore, keys},
};

const LOAD_PATH: &str = "api/progress/load/";
const SAVE_PATH: &str = "api/progress/save/";
const OVERVIEW_PATH: &str = "api/progress/overview/";

/// Remote progress backend.
#[async_trait]
pub trait ProgressApi: Send + Sync {
    async fn load_progress(&self) -> Result<LoadProgressResponse, AppError>;

    async fn save_progress(&self, req: &SaveProgressRequest) -> Result<(), AppError>;

    async fn load_overview(&self) -> Result<ProgressOverview, AppError>;
}

/// REST client for the progress backend.
#[derive(Clone)]
pub struct HttpProgressApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpProgressApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, AppError> {
        // Relative joins keep any path prefix only when the base ends with '/'.
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(&base)?,
            token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(&config.api_url, config.api_token.clone())
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AppError> {
        let url = self.base_url.join(path)?;
        let builder = self.client.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }
}

#[async_trait]
impl ProgressApi for HttpProgressApi {
    async fn load_progress(&self) -> Result<LoadProgressResponse, AppError> {
        let resp = self
            .request(Method::GET, LOAD_PATH)?
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<LoadProgressResponse>().await?)
    }

    async fn save_progress(&self, req: &SaveProgressRequest) -> Result<(), AppError> {
        self.request(Method::POST, SAVE_PATH)?
            .json(req)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn load_overview(&self) -> Result<ProgressOverview, AppError> {
        let resp = self
            .request(Method::GET, OVERVIEW_PATH)?
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<ProgressOverview>().await?)
    }
}

/// Outcome of draining the outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: usize,
    /// Entries moved to the rejected key (refused by the backend or out of attempts).
    pub dead_lettered: usize,
    pub remaining: usize,
}

/// Keeps the local cache a best-effort mirror of the backend.
///
/// Nothing here returns a network error to gameplay code. Loads fall back to
/// `None`, pushes that fail go to a durable outbox in the local store and are
/// retried in order on the next push or flush. Entries the backend refuses
/// with a 4xx, or that run out of `MAX_PUSH_ATTEMPTS`, are moved to a
/// dead-letter key so they never block the completions queued behind them.
pub struct SyncCoordinator {
    api: Arc<dyn ProgressApi>,
    store: LocalStore,
    outbox: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(api: Arc<dyn ProgressApi>, store: LocalStore) -> Self {
        Self {
            api,
            store,
            outbox: Mutex::new(()),
        }
    }

    /// Fetches the server's progress. `None` on any failure.
    pub async fn load_authoritative(&self) -> Option<LoadProgressResponse> {
        match self.api.load_progress().await {
            Ok(remote) => {
                tracing::info!(
                    highest_level = remote.highest_level,
                    total_xp = remote.total_xp,
                    "Loaded authoritative progress"
                );
                Some(remote)
            }
            Err(e) => {
                tracing::warn!("Failed to load remote progress, using local cache: {}", e);
                None
            }
        }
    }

    /// Sends a completion to the backend, queueing it if delivery fails.
    ///
    /// Completions already waiting in the outbox are sent first so the server
    /// sees them in the order they happened. Returns true when `req` was delivered.
    pub async fn push_completion(&self, req: SaveProgressRequest) -> bool {
        if let Err(e) = req.validate() {
            tracing::error!("Dropping invalid completion for level {}: {}", req.level_id, e);
            return false;
        }

        let _guard = self.outbox.lock().await;
        let mut pending = self.read_outbox().await;
        pending.push(PendingCompletion {
            request: req,
            queued_at: chrono::Utc::now(),
            attempts: 0,
        });

        let (report, last_delivered) = self.drain(&mut pending).await;
        self.store.write_field(keys::PENDING_COMPLETIONS, &pending).await;
        // With nothing left queued, the last entry processed was `req`.
        report.remaining == 0 && last_delivered
    }

    /// Retries every queued completion in order, stopping at the first retryable failure.
    pub async fn flush_outbox(&self) -> FlushReport {
        let _guard = self.outbox.lock().await;
        let mut pending = self.read_outbox().await;
        if pending.is_empty() {
            return FlushReport::default();
        }

        let (report, _) = self.drain(&mut pending).await;
        self.store.write_field(keys::PENDING_COMPLETIONS, &pending).await;
        if report.delivered > 0 || report.dead_lettered > 0 {
            tracing::info!(
                delivered = report.delivered,
                dead_lettered = report.dead_lettered,
                remaining = report.remaining,
                "Flushed completion outbox"
            );
        }
        report
    }

    pub async fn pending_completions(&self) -> Vec<PendingCompletion> {
        let _guard = self.outbox.lock().await;
        self.read_outbox().await
    }

    /// Completions the backend refused or that exhausted their attempts.
    pub async fn rejected_completions(&self) -> Vec<PendingCompletion> {
        self.store
            .read_field(keys::REJECTED_COMPLETIONS, Vec::new())
            .await
    }

    /// Aggregate dashboard figures. Read-only, not needed by the engine itself.
    pub async fn fetch_overview(&self) -> Result<ProgressOverview, AppError> {
        self.api.load_overview().await.map_err(|e| {
            tracing::warn!("Failed to fetch progress overview: {}", e);
            e
        })
    }

    async fn read_outbox(&self) -> Vec<PendingCompletion> {
        self.store
            .read_field(keys::PENDING_COMPLETIONS, Vec::new())
            .await
    }

    /// Sends queued entries head first. Returns the report and whether the
    /// last processed entry was delivered.
    async fn drain(&self, pending: &mut Vec<PendingCompletion>) -> (FlushReport, bool) {
        let mut report = FlushReport::default();
        let mut last_delivered = false;
        let mut dead = Vec::new();

        while let Some(head) = pending.first_mut() {
            match self.api.save_progress(&head.request).await {
                Ok(()) => {
                    pending.remove(0);
                    report.delivered += 1;
                    last_delivered = true;
                }
                Err(e) => {
                    head.attempts += 1;
                    let (level_id, attempts) = (head.request.level_id, head.attempts);

                    if e.is_permanent() || attempts >= MAX_PUSH_ATTEMPTS {
                        tracing::error!(
                            level_id,
                            attempts,
                            "Giving up on completion, moving it to the rejected list: {}",
                            e
                        );
                        dead.push(pending.remove(0));
                        last_delivered = false;
                        continue;
                    }

                    tracing::warn!(
                        level_id,
                        attempts,
                        queued = pending.len(),
                        "Failed to push completion, keeping it in the outbox: {}",
                        e
                    );
                    last_delivered = false;
                    break;
                }
            }
        }

        if !dead.is_empty() {
            report.dead_lettered = dead.len();
            let mut rejected = self.rejected_completions().await;
            rejected.extend(dead);
            self.store.write_field(keys::REJECTED_COMPLETIONS, &rejected).await;
        }

        report.remaining = pending.len();
        (report, last_delivered)
    }
}
