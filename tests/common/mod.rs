// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDate;
use progress_engine::{
    manager::ProgressManager,
    models::sync::{LoadProgressResponse, SaveProgressRequest},
    store::LocalStore,
    sync::HttpProgressApi,
};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::trace::TraceLayer;

/// In-process stand-in for the progress backend.
#[derive(Default)]
pub struct BackendState {
    pub online: bool,
    /// Serve a body that does not match the load contract.
    pub malformed: bool,
    /// Loads keep working while every save answers 503.
    pub saves_down: bool,
    /// Saves for this level answer 422.
    pub rejected_level: Option<u32>,
    pub highest_level: u32,
    pub completed_levels: Vec<u32>,
    pub total_xp: u32,
    pub saved: Vec<SaveProgressRequest>,
    pub auth_headers: Vec<String>,
}

#[derive(Clone)]
pub struct MockBackend {
    pub address: String,
    pub state: Arc<Mutex<BackendState>>,
}

impl MockBackend {
    pub fn set_online(&self, online: bool) {
        self.state.lock().unwrap().online = online;
    }

    pub fn saved(&self) -> Vec<SaveProgressRequest> {
        self.state.lock().unwrap().saved.clone()
    }

    pub fn api(&self, token: Option<&str>) -> HttpProgressApi {
        HttpProgressApi::new(&self.address, token.map(str::to_string)).unwrap()
    }
}

type Shared = Arc<Mutex<BackendState>>;

fn record_auth(state: &mut BackendState, headers: &HeaderMap) {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        state.auth_headers.push(value.to_string());
    }
}

async fn load(State(shared): State<Shared>, headers: HeaderMap) -> impl IntoResponse {
    let mut state = shared.lock().unwrap();
    record_auth(&mut state, &headers);

    if !state.online {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({ "error": "down" })));
    }
    if state.malformed {
        return (StatusCode::OK, Json(serde_json::json!({ "highest_level": "three" })));
    }

    let body = LoadProgressResponse {
        highest_level: state.highest_level,
        completed_levels: state.completed_levels.clone(),
        total_xp: state.total_xp,
    };
    (StatusCode::OK, Json(serde_json::to_value(body).unwrap()))
}

async fn save(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(req): Json<SaveProgressRequest>,
) -> impl IntoResponse {
    let mut state = shared.lock().unwrap();
    record_auth(&mut state, &headers);

    if !state.online || state.saves_down {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    if state.rejected_level == Some(req.level_id) {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }

    if req.passed {
        if !state.completed_levels.contains(&req.level_id) {
            state.completed_levels.push(req.level_id);
        }
        state.highest_level = state.highest_level.max(req.level_id);
    }
    state.total_xp += req.xp_earned;
    state.saved.push(req);
    StatusCode::CREATED
}

async fn overview(State(shared): State<Shared>) -> impl IntoResponse {
    let state = shared.lock().unwrap();
    if !state.online {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({})));
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "weekly_xp": 30,
            "monthly_xp": state.total_xp,
            "accuracy": 87.5,
        })),
    )
}

/// Spawns the mock backend on a random port.
pub async fn spawn_backend() -> MockBackend {
    let state: Shared = Arc::new(Mutex::new(BackendState {
        online: true,
        ..Default::default()
    }));

    let app = Router::new()
        .route("/api/progress/load/", get(load))
        .route("/api/progress/save/", post(save))
        .route("/api/progress/overview/", get(overview))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBackend { address, state }
}

/// Fresh in-memory local store with the schema applied.
pub async fn memory_store() -> LocalStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");
    let store = LocalStore::new(pool);
    store.migrate().await.expect("Failed to migrate local store");
    store
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

/// Manager over `store` talking to `backend`, with a fixed clock.
pub fn manager(store: LocalStore, backend: &MockBackend, today: NaiveDate) -> Arc<ProgressManager> {
    Arc::new(ProgressManager::new(store, Arc::new(backend.api(None))).with_clock(move || today))
}
