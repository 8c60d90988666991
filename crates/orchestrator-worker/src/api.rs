//! The worker agent's HTTP surface: `/status`, `/start_app`, `/stop_app`.
//! Matches `worker_server.py`'s three routes exactly.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::app_runner::AppRunner;

#[derive(Clone)]
pub struct AppState {
    pub worker_name: String,
    pub runner: Arc<AppRunner>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/start_app", post(start_app))
        .route("/stop_app", post(stop_app))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct StatusBody {
    worker_name: String,
    status: &'static str,
    memory_usage: f64,
    cpu_usage: f64,
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.runner.status().await;
    let (memory_usage, cpu_usage) = state.runner.usage().await;
    Json(StatusBody {
        worker_name: state.worker_name,
        status: if healthy { "healthy" } else { "app_failed_worker_running" },
        memory_usage,
        cpu_usage,
    })
}

async fn start_app(State(state): State<AppState>) -> impl IntoResponse {
    match state.runner.start().await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            tracing::error!(error = %err, "failed to start app");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn stop_app(State(state): State<AppState>) -> impl IntoResponse {
    match state.runner.stop().await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            tracing::error!(error = %err, "failed to stop app");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_runner::AppRunnerConfig;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            worker_name: "worker-test".into(),
            runner: Arc::new(AppRunner::new(AppRunnerConfig {
                worker_name: "worker-test".into(),
                app_image: "app:latest".into(),
                app_port: 9999,
                healthcheck_api: String::new(),
            })),
        }
    }

    #[tokio::test]
    async fn status_reports_unhealthy_when_no_container_exists() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "app_failed_worker_running");
        assert_eq!(parsed["worker_name"], "worker-test");
    }
}
