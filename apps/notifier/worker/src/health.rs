//! Health check handlers.
//!
//! - Liveness: `/health`
//! - Readiness: `/ready` (Redis PING, database ping, email provider)
//! - Prometheus metrics: `/metrics`

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use core_config::AppInfo;
use domain_notifications::EmailProvider;
use redis::aio::ConnectionManager;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;

use crate::metrics;

/// A dependency the worker needs before it can make progress.
#[async_trait]
pub trait DependencyCheck: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> Result<(), String>;
}

pub struct RedisCheck(pub ConnectionManager);

#[async_trait]
impl DependencyCheck for RedisCheck {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn check(&self) -> Result<(), String> {
        let mut conn = self.0.clone();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| format!("error: {e}"))?;
        if response == "PONG" {
            Ok(())
        } else {
            Err(format!("unexpected response: {response}"))
        }
    }
}

pub struct DatabaseCheck(pub DatabaseConnection);

#[async_trait]
impl DependencyCheck for DatabaseCheck {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> Result<(), String> {
        self.0.ping().await.map_err(|e| format!("error: {e}"))
    }
}

/// Readiness of the selected email provider, via its own health check.
pub struct ProviderCheck<P>(pub Arc<P>);

#[async_trait]
impl<P: EmailProvider + 'static> DependencyCheck for ProviderCheck<P> {
    fn name(&self) -> &'static str {
        "email_provider"
    }

    async fn check(&self) -> Result<(), String> {
        match self.0.health_check().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!("{} provider unavailable", self.0.name())),
            Err(e) => Err(format!("error: {e}")),
        }
    }
}

/// Shared state for health endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub app: AppInfo,
    pub streams: Vec<String>,
    checks: Arc<Vec<Box<dyn DependencyCheck>>>,
}

impl HealthState {
    pub fn new(app: AppInfo, streams: Vec<String>, checks: Vec<Box<dyn DependencyCheck>>) -> Self {
        Self {
            app,
            streams,
            checks: Arc::new(checks),
        }
    }
}

/// Health response for liveness probes.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub version: String,
    pub streams: Vec<String>,
}

pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        name: state.app.name.to_string(),
        version: state.app.version.to_string(),
        streams: state.streams,
    })
}

pub async fn ready_handler(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    let mut checks = Map::new();
    let mut ready = true;

    for check in state.checks.iter() {
        let status = match check.check().await {
            Ok(()) => "ok".to_string(),
            Err(e) => {
                ready = false;
                e
            }
        };
        checks.insert(check.name().to_string(), Value::String(status));
    }

    let (code, status) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };
    (code, Json(json!({ "status": status, "checks": checks })))
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use domain_notifications::providers::{EmailContent, SentEmail};
    use domain_notifications::{CapturingEmailProvider, NotificationError, NotificationResult};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct Stub {
        name: &'static str,
        result: Result<(), String>,
    }

    #[async_trait]
    impl DependencyCheck for Stub {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn check(&self) -> Result<(), String> {
            self.result.clone()
        }
    }

    /// `None` makes the health check raise.
    struct UnreachableRelay {
        healthy: Option<bool>,
    }

    #[async_trait]
    impl EmailProvider for UnreachableRelay {
        async fn send(&self, _email: &EmailContent) -> NotificationResult<SentEmail> {
            Err(NotificationError::ProviderError("relay down".to_string()))
        }

        fn name(&self) -> &'static str {
            "SMTP"
        }

        async fn health_check(&self) -> NotificationResult<bool> {
            self.healthy.ok_or_else(|| {
                NotificationError::ProviderError("connection refused".to_string())
            })
        }
    }

    fn state(checks: Vec<Box<dyn DependencyCheck>>) -> HealthState {
        HealthState::new(
            AppInfo {
                name: "notifier_worker",
                version: "0.1.0",
            },
            vec!["events:user-login".to_string()],
            checks,
        )
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_reports_app_info() {
        let (status, body) = get_json(health_router(state(vec![])), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["name"], "notifier_worker");
        assert_eq!(body["streams"][0], "events:user-login");
    }

    #[tokio::test]
    async fn ready_when_all_checks_pass() {
        let checks: Vec<Box<dyn DependencyCheck>> = vec![
            Box::new(Stub { name: "redis", result: Ok(()) }),
            Box::new(Stub { name: "database", result: Ok(()) }),
        ];

        let (status, body) = get_json(health_router(state(checks)), "/ready").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["checks"]["database"], "ok");
    }

    #[tokio::test]
    async fn not_ready_when_a_check_fails() {
        let checks: Vec<Box<dyn DependencyCheck>> = vec![
            Box::new(Stub { name: "redis", result: Ok(()) }),
            Box::new(Stub {
                name: "database",
                result: Err("error: connection refused".to_string()),
            }),
        ];

        let (status, body) = get_json(health_router(state(checks)), "/ready").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "not_ready");
        assert_eq!(body["checks"]["redis"], "ok");
        assert_eq!(body["checks"]["database"], "error: connection refused");
    }

    #[tokio::test]
    async fn not_ready_when_email_provider_is_unreachable() {
        let relay = UnreachableRelay { healthy: None };
        let checks: Vec<Box<dyn DependencyCheck>> = vec![
            Box::new(Stub { name: "redis", result: Ok(()) }),
            Box::new(ProviderCheck(Arc::new(relay))),
        ];

        let (status, body) = get_json(health_router(state(checks)), "/ready").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["checks"]["redis"], "ok");
        let provider = body["checks"]["email_provider"].as_str().unwrap();
        assert!(provider.starts_with("error:"));
        assert!(provider.contains("connection refused"));
    }

    #[tokio::test]
    async fn provider_reporting_unhealthy_names_itself() {
        let check = ProviderCheck(Arc::new(UnreachableRelay { healthy: Some(false) }));

        assert_eq!(check.name(), "email_provider");
        assert_eq!(check.check().await, Err("SMTP provider unavailable".to_string()));
    }

    #[tokio::test]
    async fn ready_with_capturing_provider() {
        let checks: Vec<Box<dyn DependencyCheck>> = vec![Box::new(ProviderCheck(Arc::new(
            CapturingEmailProvider::new(),
        )))];

        let (status, body) = get_json(health_router(state(checks)), "/ready").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["email_provider"], "ok");
    }

    #[tokio::test]
    async fn metrics_endpoint_is_plain_text() {
        let response = health_router(state(vec![]))
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
    }
}
