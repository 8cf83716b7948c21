use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/submissions", post(handlers::submit_grade))
        .route("/submissions/:id", get(handlers::get_submission))
        .route("/run", post(handlers::run_adhoc))
        .route("/status", get(handlers::health_check))
}
