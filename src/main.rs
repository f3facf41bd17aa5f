// src/main.rs

use progress_engine::config::Config;
use progress_engine::manager::ProgressManager;
use progress_engine::state::AppState;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "progress.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let state = match AppState::connect(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to start progress session: {}", e);
            std::process::exit(1);
        }
    };

    if ProgressManager::install_global(state.manager.clone()).is_err() {
        tracing::warn!("A progress manager was already installed");
    }

    // Flush the offline outbox, then take the server's record as the baseline
    let progress = state.manager.init().await;
    let pending = state.manager.sync().pending_completions().await;

    tracing::info!(
        total_xp = progress.total_xp(),
        highest_unlocked_level = progress.highest_unlocked_level(),
        completed_levels = progress.completed_levels().len(),
        current_streak = progress.current_streak(),
        hearts = progress.hearts(),
        pending_completions = pending.len(),
        "Progress session ready"
    );

    match serde_json::to_string_pretty(&progress) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to render progress snapshot: {}", e),
    }
}
