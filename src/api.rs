use std::sync::Arc;

use anyhow::{Error, Result};
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    clients::health::HealthChecker,
    models::{
        failure::FailedNotification,
        health::HealthStatus,
        response::{ApiResponse, ListMeta},
        status::FailureStatus,
    },
    notifications::{dispatcher::NotificationDispatcher, store::FailureStore},
};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

pub struct AppState {
    pub health_checker: HealthChecker,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub failure_store: Arc<dyn FailureStore>,
}

#[derive(Debug, Deserialize)]
pub struct FailedNotificationsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .route("/failed-notifications", get(failed_notifications))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(
    port: u16,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), Error> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "HTTP server started");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::success(
        state.dispatcher.stats(),
        "Dispatcher statistics".to_string(),
    ))
}

async fn failed_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FailedNotificationsQuery>,
) -> impl IntoResponse {
    let status = match query.status.as_deref().unwrap_or("pending").parse::<FailureStatus>() {
        Ok(status) => status,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<Vec<FailedNotification>>::error(
                    e,
                    "Invalid status filter".to_string(),
                )),
            );
        }
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    match state.failure_store.list_by_status(status, limit).await {
        Ok(records) => {
            let meta = ListMeta {
                count: records.len(),
                limit,
                status: status.to_string(),
            };
            (
                StatusCode::OK,
                Json(
                    ApiResponse::success(records, "Failed notifications retrieved".to_string())
                        .with_meta(meta),
                ),
            )
        }
        Err(e) => {
            warn!(error = %e, "Failed to list failed notifications");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(
                    e.to_string(),
                    "Failed to list failed notifications".to_string(),
                )),
            )
        }
    }
}
