//! Webhook HTTP server.
//!
//! Accepts GitHub `issues` deliveries on `POST /webhooks/github` and hands
//! them to a [`WebhookHandler`], normally the installation's
//! [`SyncOrchestrator`].

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::signature::verify_signature;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{SyncResult, WebhookConfig, WebhookEvent};
use crate::domain::ports::{DeliveryLog, InstallationRepository, IssueTracker, LocalIssueStore, MappingStore};
use crate::services::SyncOrchestrator;

/// Unique id of one delivery.
pub const DELIVERY_HEADER: &str = "x-github-delivery";
/// Event name, e.g. `issues`.
pub const EVENT_HEADER: &str = "x-github-event";
/// HMAC-SHA256 of the body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Consumer of verified webhook events.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Process one event.
    async fn handle(&self, event: WebhookEvent) -> DomainResult<SyncResult>;
}

#[async_trait]
impl<T, S, M, I, D> WebhookHandler for SyncOrchestrator<T, S, M, I, D>
where
    T: IssueTracker + 'static,
    S: LocalIssueStore + 'static,
    M: MappingStore + 'static,
    I: InstallationRepository + 'static,
    D: DeliveryLog + 'static,
{
    async fn handle(&self, event: WebhookEvent) -> DomainResult<SyncResult> {
        self.process_webhook_event(&event).await
    }
}

/// Configuration for the webhook server.
#[derive(Debug, Clone)]
pub struct WebhookServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port; 0 picks a free one.
    pub port: u16,
    /// Shared secret for `X-Hub-Signature-256`; unsigned requests are
    /// accepted when `None`.
    pub secret: Option<String>,
}

impl Default for WebhookServerConfig {
    fn default() -> Self {
        Self::from_config(&WebhookConfig::default(), None)
    }
}

impl WebhookServerConfig {
    /// Listener settings from `config`; an empty secret counts as none.
    pub fn from_config(config: &WebhookConfig, secret: Option<String>) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// Read the secret from the environment variable named in `config`.
    pub fn from_env(config: &WebhookConfig) -> Self {
        Self::from_config(config, std::env::var(&config.secret_env).ok())
    }
}

/// Shared state for the webhook server.
pub struct WebhookState {
    /// Receives every verified event.
    pub handler: Arc<dyn WebhookHandler>,
    /// Listener settings.
    pub config: WebhookServerConfig,
}

/// Webhook HTTP server.
pub struct WebhookServer {
    state: Arc<WebhookState>,
}

impl WebhookServer {
    /// Server dispatching to `handler`.
    pub fn new(handler: Arc<dyn WebhookHandler>, config: WebhookServerConfig) -> Self {
        Self {
            state: Arc::new(WebhookState { handler, config }),
        }
    }

    /// Build the router with all endpoints.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/webhooks/github", post(receive_github_webhook))
            .route("/health", get(health_check))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.state.config.host, self.state.config.port).parse()?;
        let router = self.router();

        if self.state.config.secret.is_none() {
            warn!("no webhook secret configured; accepting unsigned deliveries");
        }
        info!("Webhook server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    service: String,
}

fn error_response(status: StatusCode, code: &str, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        }),
    )
        .into_response()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "beadsync".to_string(),
    })
}

async fn receive_github_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.config.secret {
        if let Err(e) = verify_signature(&body, header(&headers, SIGNATURE_HEADER), secret) {
            warn!(error = %e, "rejected webhook delivery");
            return error_response(StatusCode::UNAUTHORIZED, "invalid_signature", e);
        }
    }

    let Some(delivery_id) = header(&headers, DELIVERY_HEADER) else {
        return error_response(StatusCode::BAD_REQUEST, "missing_header", "missing X-GitHub-Delivery header");
    };
    let Some(event_kind) = header(&headers, EVENT_HEADER) else {
        return error_response(StatusCode::BAD_REQUEST, "missing_header", "missing X-GitHub-Event header");
    };

    let event = match WebhookEvent::from_body(delivery_id, event_kind, &body) {
        Ok(event) => event,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "invalid_payload", e),
    };
    if event.is_issue_event() {
        if let Err(e) = event.issue() {
            return error_response(StatusCode::BAD_REQUEST, "invalid_payload", e);
        }
    }

    match state.handler.handle(event).await {
        Ok(result) => (StatusCode::ACCEPTED, Json(result)).into_response(),
        Err(e @ DomainError::SyncInProgress(_)) => {
            warn!(delivery_id, error = %e, "webhook delivery deferred");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "sync_in_progress", e)
        }
        Err(e) => {
            warn!(delivery_id, error = %e, "webhook processing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "processing_failed", e)
        }
    }
}
