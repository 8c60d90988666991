//! The orchestrator HTTP API: read access to the worker registry plus a
//! forced-refresh endpoint. No authentication, per `spec.md` §4.5.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use futures_util::future::join_all;
use orchestrator_core::config::MasterConfig;
use orchestrator_core::WorkerRecord;
use orchestrator_engine::{refresh_worker, AgentClient, WorkerRegistry};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<WorkerRegistry>,
    pub agent: Arc<dyn AgentClient>,
    pub config: Arc<MasterConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/workers", get(get_workers).put(put_workers))
        .route("/healthy_hosts", get(get_healthy_hosts))
        .route("/settings", get(get_settings))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> &'static str {
    "orchestrator running"
}

async fn get_workers(State(state): State<AppState>) -> impl IntoResponse {
    let workers: BTreeMap<String, WorkerRecord> = state
        .registry
        .snapshot()
        .into_iter()
        .map(|record| (record.name.clone(), record))
        .collect();
    Json(workers)
}

/// Force-refresh every registered worker's status before returning.
async fn put_workers(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.registry.snapshot();
    let refreshes = snapshot
        .iter()
        .map(|record| refresh_worker(&state.registry, state.agent.as_ref(), &record.name, &record.host));
    join_all(refreshes).await;
    StatusCode::NO_CONTENT
}

async fn get_healthy_hosts(State(state): State<AppState>) -> impl IntoResponse {
    let app_port = state.config.app_info.app_port;
    let hosts: Vec<String> = state
        .registry
        .snapshot()
        .into_iter()
        .filter(|r| r.status.is_healthy())
        .map(|r| format!("{}:{}", r.host, app_port))
        .collect();
    Json(hosts)
}

#[derive(Serialize, Deserialize)]
struct Settings {
    worker_limits: orchestrator_core::config::WorkerLimits,
    virtual_machines: Vec<String>,
    worker_port: u16,
    app_port: u16,
}

async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(Settings {
        worker_limits: state.config.worker_limits,
        virtual_machines: state.config.virtual_machines.clone(),
        worker_port: state.config.worker_info.port,
        app_port: state.config.app_info.app_port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use orchestrator_core::config::{AppInfo, WorkerInfo, WorkerLimits};
    use orchestrator_core::{WorkerRecord, WorkerStatus};
    use orchestrator_engine::agent_client::{AgentError, StatusResponse};
    use tower::ServiceExt;

    struct NullAgent;

    #[async_trait::async_trait]
    impl AgentClient for NullAgent {
        async fn status(&self, _host: &str) -> Result<StatusResponse, AgentError> {
            unreachable!()
        }
        async fn start_app(&self, _host: &str) -> Result<(), AgentError> {
            unreachable!()
        }
        async fn stop_app(&self, _host: &str) -> Result<(), AgentError> {
            unreachable!()
        }
        async fn deploy(&self, _host: &str, _worker_name: &str) -> Result<(), AgentError> {
            unreachable!()
        }
        async fn remove_container(&self, _host: &str, _worker_name: &str) -> Result<(), AgentError> {
            unreachable!()
        }
    }

    fn test_state() -> AppState {
        let registry = Arc::new(WorkerRegistry::new());
        let mut healthy = WorkerRecord::new("worker-a", "vm1");
        healthy.status = WorkerStatus::Healthy;
        registry.put(healthy);
        registry.put(WorkerRecord::new("worker-b", "vm2"));

        let config = Arc::new(MasterConfig {
            app_info: AppInfo {
                image: "app:latest".into(),
                app_port: 9090,
                healthcheck: "/healthz".into(),
                git_repo: "git@x:y.git".into(),
                dockerfile: "Dockerfile".into(),
            },
            worker_info: WorkerInfo {
                port: 9000,
                git_repo: "git@x:w.git".into(),
                dockerfile: "Dockerfile".into(),
            },
            worker_limits: WorkerLimits {
                min_workers: 1,
                max_workers: 5,
                memory_limit: 80.0,
                cpu_limit: 80.0,
            },
            virtual_machines: vec!["vm1".into(), "vm2".into(), "vm3".into()],
        });

        AppState {
            registry,
            agent: Arc::new(NullAgent),
            config,
        }
    }

    #[tokio::test]
    async fn get_workers_returns_registry_snapshot() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/workers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: BTreeMap<String, WorkerRecord> = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[tokio::test]
    async fn get_healthy_hosts_filters_and_formats() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/healthy_hosts").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let hosts: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(hosts, vec!["vm1:9090".to_string()]);
    }

    #[tokio::test]
    async fn get_settings_reflects_config() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: Settings = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.worker_port, 9000);
        assert_eq!(parsed.virtual_machines.len(), 3);
    }

    #[tokio::test]
    async fn index_returns_ok() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
