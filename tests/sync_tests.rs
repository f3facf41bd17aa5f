// tests/sync_tests.rs

mod common;

use std::sync::Arc;

use common::{day, manager, memory_store, spawn_backend};
use progress_engine::{
    manager::ProgressManager,
    models::sync::SaveProgressRequest,
    store::keys,
    sync::{ProgressApi, SyncCoordinator},
};

#[tokio::test]
async fn http_api_round_trips_and_sends_bearer_token() {
    // Arrange
    let backend = spawn_backend().await;
    {
        let mut state = backend.state.lock().unwrap();
        state.highest_level = 2;
        state.completed_levels = vec![1, 2];
        state.total_xp = 20;
    }
    let api = backend.api(Some("secret-token"));

    // Act
    let loaded = api.load_progress().await.unwrap();
    api.save_progress(&SaveProgressRequest {
        level_id: 3,
        score: 4,
        total: 5,
        xp_earned: 10,
        passed: true,
    })
    .await
    .unwrap();

    // Assert
    assert_eq!(loaded.highest_level, 2);
    assert_eq!(loaded.completed_levels, vec![1, 2]);
    assert_eq!(loaded.total_xp, 20);

    let state = backend.state.lock().unwrap();
    assert_eq!(state.highest_level, 3);
    assert_eq!(state.auth_headers, vec!["Bearer secret-token"; 2]);
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let backend = spawn_backend().await;
    backend.set_online(false);
    let api = backend.api(None);

    assert!(api.load_progress().await.is_err());
    assert!(api.load_overview().await.is_err());
}

#[tokio::test]
async fn client_errors_are_permanent_and_outages_are_not() {
    let backend = spawn_backend().await;
    backend.state.lock().unwrap().rejected_level = Some(2);
    let api = backend.api(None);
    let req = |level_id| SaveProgressRequest {
        level_id,
        score: 5,
        total: 5,
        xp_earned: 10,
        passed: true,
    };

    let refused = api.save_progress(&req(2)).await.unwrap_err();
    assert!(refused.is_permanent());

    backend.set_online(false);
    let outage = api.save_progress(&req(1)).await.unwrap_err();
    assert!(!outage.is_permanent());
}

#[tokio::test]
async fn rejected_completion_does_not_block_the_outbox() {
    // Arrange: the backend refuses level 2 outright
    let backend = spawn_backend().await;
    backend.state.lock().unwrap().rejected_level = Some(2);
    let manager = manager(memory_store().await, &backend, day(10));
    manager.init().await;

    // Act
    let mut delivered = Vec::new();
    for level in 1..=5 {
        let outcome = manager.complete_level(level, 5, 5, 10).await.unwrap();
        delivered.push(outcome.sync_task.await.unwrap());
    }

    // Assert: everything after the refused entry still reached the server
    assert_eq!(delivered, vec![true, false, true, true, true]);
    let levels: Vec<u32> = backend.saved().iter().map(|r| r.level_id).collect();
    assert_eq!(levels, vec![1, 3, 4, 5]);
    assert!(manager.sync().pending_completions().await.is_empty());

    let rejected = manager.sync().rejected_completions().await;
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].request.level_id, 2);

    // Local progress is untouched by the refusal.
    assert_eq!(manager.snapshot().await.highest_unlocked_level(), 5);
}

#[tokio::test]
async fn queued_completions_survive_server_wins_load() {
    // Arrange: clear levels 1..=3 while fully offline
    let backend = spawn_backend().await;
    backend.set_online(false);
    let store = memory_store().await;

    let offline = manager(store.clone(), &backend, day(10));
    offline.init().await;
    for level in 1..=3 {
        let outcome = offline.complete_level(level, 5, 5, 10).await.unwrap();
        assert!(!outcome.sync_task.await.unwrap());
    }

    // Act: next session can load but every save still fails
    {
        let mut state = backend.state.lock().unwrap();
        state.online = true;
        state.saves_down = true;
    }
    let next = manager(store.clone(), &backend, day(11));
    let progress = next.init().await;

    // Assert: the empty server record did not erase the queued work
    assert!(backend.saved().is_empty());
    assert_eq!(next.sync().pending_completions().await.len(), 3);
    assert_eq!(progress.completed_levels().len(), 3);
    assert_eq!(progress.highest_unlocked_level(), 3);
    assert_eq!(progress.total_xp(), 30);
    assert!(next.is_level_unlocked(4).await);

    let cached: u32 = store.read_field(keys::TOTAL_XP, 0).await;
    assert_eq!(cached, 30);

    // Once saves recover the queue drains and the server agrees.
    backend.state.lock().unwrap().saves_down = false;
    let report = next.sync().flush_outbox().await;
    assert_eq!(report.delivered, 3);
    let state = backend.state.lock().unwrap();
    assert_eq!(state.highest_level, 3);
    assert_eq!(state.total_xp, 30);
}

#[tokio::test]
async fn server_wins_on_load() {
    let backend = spawn_backend().await;
    {
        let mut state = backend.state.lock().unwrap();
        state.highest_level = 2;
        state.completed_levels = vec![1, 2];
        state.total_xp = 15;
    }

    // A stale device cache that claims more progress than the server.
    let store = memory_store().await;
    store.write_field(keys::HIGHEST_UNLOCKED_LEVEL, &5u32).await;
    store.write_field(keys::COMPLETED_LEVELS, &vec![1u32, 2, 3, 4, 5]).await;
    store.write_field(keys::TOTAL_XP, &50u32).await;
    store.write_field(keys::HEARTS, &2u32).await;

    let manager = manager(store.clone(), &backend, day(10));
    let progress = manager.init().await;

    assert_eq!(progress.highest_unlocked_level(), 2);
    assert_eq!(progress.completed_levels().len(), 2);
    assert_eq!(progress.total_xp(), 15);
    // Device-local fields survive the overwrite.
    assert_eq!(progress.hearts(), 2);

    let cached: u32 = store.read_field(keys::HIGHEST_UNLOCKED_LEVEL, 0).await;
    assert_eq!(cached, 2);
}

#[tokio::test]
async fn load_failure_falls_back_to_local_cache() {
    let backend = spawn_backend().await;
    backend.set_online(false);

    let store = memory_store().await;
    store.write_field(keys::HIGHEST_UNLOCKED_LEVEL, &3u32).await;
    store.write_field(keys::COMPLETED_LEVELS, &vec![1u32, 2, 3]).await;
    store.write_field(keys::TOTAL_XP, &30u32).await;

    let manager = manager(store, &backend, day(10));
    let progress = manager.init().await;

    assert_eq!(progress.highest_unlocked_level(), 3);
    assert_eq!(progress.total_xp(), 30);
    assert!(manager.is_level_unlocked(4).await);
}

#[tokio::test]
async fn malformed_payload_falls_back_to_local_cache() {
    let backend = spawn_backend().await;
    backend.state.lock().unwrap().malformed = true;

    let store = memory_store().await;
    store.write_field(keys::TOTAL_XP, &12u32).await;

    let manager = manager(store, &backend, day(10));
    let progress = manager.init().await;
    assert_eq!(progress.total_xp(), 12);
}

#[tokio::test]
async fn corrupt_cache_and_no_backend_start_fresh() {
    let backend = spawn_backend().await;
    backend.set_online(false);

    let store = memory_store().await;
    store.write_field(keys::TOTAL_XP, "lots").await;
    store.write_field(keys::HEARTS, &99u32).await;

    let manager = manager(store, &backend, day(10));
    let progress = manager.init().await;

    assert_eq!(progress.total_xp(), 0);
    assert_eq!(progress.hearts(), 5);
    assert_eq!(progress.highest_unlocked_level(), 0);
}

#[tokio::test]
async fn offline_completion_reaches_server_on_next_session() {
    // Arrange: play offline
    let backend = spawn_backend().await;
    backend.set_online(false);
    let store = memory_store().await;

    let offline = manager(store.clone(), &backend, day(10));
    offline.init().await;
    let outcome = offline.complete_level(1, 5, 5, 10).await.unwrap();

    // Local state is already correct even though the push failed.
    assert!(!outcome.sync_task.await.unwrap());
    assert_eq!(offline.snapshot().await.highest_unlocked_level(), 1);
    assert_eq!(offline.sync().pending_completions().await.len(), 1);

    // Act: next session with the backend reachable again
    backend.set_online(true);
    let online = manager(store, &backend, day(11));
    let progress = online.init().await;

    // Assert: the outbox was delivered before the authoritative load
    assert_eq!(backend.saved().len(), 1);
    assert_eq!(progress.highest_unlocked_level(), 1);
    assert_eq!(progress.total_xp(), 10);
    assert!(online.sync().pending_completions().await.is_empty());
}

#[tokio::test]
async fn push_failure_does_not_roll_back_local_state() {
    let backend = spawn_backend().await;
    let manager = manager(memory_store().await, &backend, day(10));
    manager.init().await;
    backend.set_online(false);

    let outcome = manager.complete_level(1, 5, 5, 10).await.unwrap();
    assert!(!outcome.sync_task.await.unwrap());

    let progress = manager.snapshot().await;
    assert_eq!(progress.total_xp(), 10);
    assert!(progress.completed_levels().contains(&1));
}

#[tokio::test]
async fn overview_is_read_through() {
    let backend = spawn_backend().await;
    backend.state.lock().unwrap().total_xp = 120;
    let manager = manager(memory_store().await, &backend, day(10));

    let overview = manager.overview().await.unwrap();
    assert_eq!(overview.weekly_xp, 30);
    assert_eq!(overview.monthly_xp, 120);
    assert_eq!(overview.accuracy, 87.5);

    backend.set_online(false);
    assert!(manager.overview().await.is_err());
}

#[tokio::test]
async fn coordinator_can_be_shared_directly() {
    let backend = spawn_backend().await;
    let store = memory_store().await;
    let sync = SyncCoordinator::new(Arc::new(backend.api(None)), store);

    backend.set_online(false);
    assert!(!sync.push_completion(SaveProgressRequest {
        level_id: 1,
        score: 5,
        total: 5,
        xp_earned: 10,
        passed: true,
    })
    .await);

    backend.set_online(true);
    let report = sync.flush_outbox().await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.remaining, 0);
    assert_eq!(backend.saved().len(), 1);
}

#[tokio::test]
async fn global_accessor_returns_installed_manager() {
    let backend = spawn_backend().await;
    let installed = manager(memory_store().await, &backend, day(10));

    assert!(ProgressManager::install_global(installed.clone()).is_ok());
    let global = ProgressManager::global().expect("manager installed");
    assert!(Arc::ptr_eq(&global, &installed));

    // A second install is refused and leaves the first in place.
    let other = manager(memory_store().await, &backend, day(10));
    assert!(ProgressManager::install_global(other).is_err());
    assert!(Arc::ptr_eq(&ProgressManager::global().unwrap(), &installed));
}
