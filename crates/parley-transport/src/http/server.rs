//! axum webhook server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use parking_lot::Mutex;
use parley_core::{ParleyResult, RequestHandler, Transport};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::HttpServerConfig;

// =============================================================================
// HttpTransport
// =============================================================================

/// One webhook request.
pub struct HttpTransport {
    request: Value,
    headers: HashMap<String, String>,
    response: Arc<Mutex<Option<Value>>>,
}

impl HttpTransport {
    fn new(request: Value, headers: &HeaderMap, response: Arc<Mutex<Option<Value>>>) -> Self {
        let headers = headers
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect();
        Self {
            request,
            headers,
            response,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn request_object(&self) -> &Value {
        &self.request
    }

    fn header(&self, name: &str) -> Option<&str> {
        // `HeaderMap` names are already lowercase.
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    async fn set_response(&mut self, response: Value) -> ParleyResult<()> {
        *self.response.lock() = Some(response);
        Ok(())
    }
}

// =============================================================================
// HttpServer
// =============================================================================

struct WebhookState {
    handler: Arc<dyn RequestHandler>,
}

/// Serves a [`RequestHandler`] on a single POST route.
#[derive(Debug, Clone, Default)]
pub struct HttpServer {
    config: HttpServerConfig,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig) -> Self {
        Self { config }
    }

    /// Builds the router without binding, e.g. to nest it in a larger app.
    pub fn router(&self, handler: Arc<dyn RequestHandler>) -> Router {
        Router::new()
            .route(&self.config.normalized_path(), post(webhook))
            .with_state(Arc::new(WebhookState { handler }))
    }

    /// Binds the listener and serves in a background task.
    pub async fn serve(&self, handler: Arc<dyn RequestHandler>) -> std::io::Result<ListenerHandle> {
        let router = self.router(handler);
        let listener = TcpListener::bind(&self.config.addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, path = %self.config.normalized_path(), "HTTP server listening");

        let token = CancellationToken::new();
        let shutdown = token.clone();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = server.await {
                error!(error = %e, "HTTP server error");
            }
            info!(addr = %local_addr, "HTTP server stopped");
        });

        Ok(ListenerHandle {
            local_addr,
            token,
            task,
        })
    }
}

/// A running server.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// The bound address, with the actual port when `0` was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "HTTP server task did not finish cleanly");
        }
    }
}

async fn webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, len = body.len(), "Rejecting non-JSON webhook body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid JSON body: {e}") })),
            )
                .into_response();
        }
    };

    let slot = Arc::new(Mutex::new(None));
    let transport = HttpTransport::new(request, &headers, Arc::clone(&slot));

    if let Err(e) = state.handler.handle(Box::new(transport)).await {
        error!(error = %e, "Webhook request failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    let response = slot.lock().take();
    match response {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => {
            debug!("Webhook request produced no response");
            StatusCode::NO_CONTENT.into_response()
        }
    }
}
