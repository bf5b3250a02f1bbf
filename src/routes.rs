
use crate::bot_client::BotClientFactory;
use crate::config::Config;
use crate::queue::TaskQueue;
use crate::task_processor::handle_task;
use crate::webhook::handle_callback;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Process-wide state, built once in `main` and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: TaskQueue,
    pub bot_factory: BotClientFactory,
}

async fn healthz() -> &'static str {
    "ok"
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/callback", post(handle_callback))
        .route("/task", post(handle_task))
        .route("/healthz", get(healthz))
        .with_state(state)
}
