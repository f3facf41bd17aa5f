// src/state.rs

use std::{sync::Arc, time::Duration};

use sqlx::sqlite::SqlitePoolOptions;

use crate::{
    config::Config, error::AppError, manager::ProgressManager, store::LocalStore,
    sync::HttpProgressApi,
};

const CONNECT_RETRIES: u32 = 5;

/// Everything a client session needs, wired from `Config`.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: LocalStore,
    pub manager: Arc<ProgressManager>,
}

impl AppState {
    /// Opens the local store (with retry), applies migrations and builds the manager.
    /// The manager is not initialized yet; call `ProgressManager::init` next.
    pub async fn connect(config: Config) -> Result<Self, AppError> {
        let mut retry_count = 0;
        let pool = loop {
            match SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Duration::from_secs(3))
                .connect(&config.database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) => {
                    retry_count += 1;
                    if retry_count > CONNECT_RETRIES {
                        return Err(AppError::Storage(format!(
                            "failed to open local store after {} retries: {}",
                            CONNECT_RETRIES, e
                        )));
                    }
                    tracing::warn!("Local store not ready, retrying in 2s... (Attempt {})", retry_count);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        };

        let store = LocalStore::new(pool);
        store.migrate().await?;
        tracing::info!("Local store ready at {}", config.database_url);

        let api = HttpProgressApi::from_config(&config)?;
        let manager = Arc::new(ProgressManager::new(store.clone(), Arc::new(api)));

        Ok(Self {
            config,
            store,
            manager,
        })
    }
}
