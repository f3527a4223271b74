//! Liveness endpoint.
//!
//! Answers `GET /` and `GET /health` with `{"status":"ok"}` while the
//! process is alive. It never touches reminder state.

use crate::config::HealthConfig;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

pub fn health_router() -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
}

pub async fn run_health_server(config: HealthConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_health(listener).await
}

/// Serve the liveness routes on an already-bound listener.
pub async fn serve_health(listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    tracing::info!("health endpoint listening on http://{local_addr}");
    axum::serve(listener, health_router()).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn health_routes_report_ok() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_health(listener));

        let client = reqwest::Client::new();
        for route in ["/", "/health"] {
            let response = client
                .get(format!("http://{addr}{route}"))
                .send()
                .await
                .unwrap();
            assert!(response.status().is_success());
            let body: serde_json::Value = response.json().await.unwrap();
            assert_eq!(body["status"], "ok");
        }

        let missing = client
            .get(format!("http://{addr}/reminders"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        server.abort();
    }
}
