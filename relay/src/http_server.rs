use crate::config::RelayConfig;
use crate::session;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chatkit_core::{ChatKitClient, ChatKitError};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    config: Arc<RelayConfig>,
    chatkit: Option<Arc<ChatKitClient>>,
}

impl AppState {
    /// Build shared state. The client is absent when no API key was
    /// configured; the exchange route then reports the missing key per
    /// request instead of refusing to start.
    pub fn new(config: RelayConfig, chatkit: Option<ChatKitClient>) -> Self {
        Self {
            config: Arc::new(config),
            chatkit: chatkit.map(Arc::new),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Failures surfaced by the session exchange endpoint
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Missing OPENAI_API_KEY environment variable")]
    MissingApiKey,

    #[error("Missing workflow id")]
    MissingWorkflowId,

    #[error("{message}")]
    Upstream { status_code: u16, message: String },

    #[error("Failed to reach ChatKit API: {0}")]
    UpstreamUnreachable(String),

    #[error("Missing client secret in response")]
    MissingClientSecret,

    #[error("{0}")]
    Internal(String),
}

impl ExchangeError {
    /// HTTP status this error maps to
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingWorkflowId => StatusCode::BAD_REQUEST,
            Self::Upstream { status_code, .. } => {
                StatusCode::from_u16(*status_code).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::UpstreamUnreachable(_) | Self::MissingClientSecret => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a newly minted identity still gets its cookie alongside
    /// this error. Failures past the upstream call keep it so the browser
    /// retries with a stable id.
    fn preserves_cookie(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. } | Self::UpstreamUnreachable(_) | Self::MissingClientSecret
        )
    }
}

impl From<ChatKitError> for ExchangeError {
    fn from(err: ChatKitError) -> Self {
        match err {
            ChatKitError::HttpError {
                status_code,
                message,
            } => Self::Upstream {
                status_code,
                message,
            },
            ChatKitError::RequestError(details) => Self::UpstreamUnreachable(details),
            ChatKitError::MissingClientSecret => Self::MissingClientSecret,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ExchangeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self, "Session exchange failed");
        } else {
            warn!(status = %status, error = %self, "Session exchange rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Start the HTTP server
pub async fn run_server(
    config: RelayConfig,
    chatkit: Option<ChatKitClient>,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);

    let state = AppState::new(config, chatkit);
    let app = router(state);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

/// Build the relay router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            post(handle_exchange)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route("/healthz", get(health))
        .layer(middleware::from_fn(cors_headers))
        .with_state(state)
}

/// Attach the permissive CORS headers the exchange contract requires to
/// every response, error branches and router fallbacks included.
async fn cors_headers<B>(request: Request<B>, next: Next<B>) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    response
}

/// Health check handler
async fn health() -> impl IntoResponse {
    "ChatKit relay is running"
}

/// CORS preflight handler; the headers come from the middleware
async fn preflight() -> impl IntoResponse {
    StatusCode::OK
}

/// JSON 405 for unsupported methods on the exchange route
async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody {
            error: "Method Not Allowed".to_string(),
        }),
    )
}

/// Handler for session exchange requests
async fn handle_exchange(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let chatkit = match &state.chatkit {
        Some(client) => client.clone(),
        None => return ExchangeError::MissingApiKey.into_response(),
    };

    let body = parse_request_body(&body);
    let workflow_id =
        match resolve_workflow_id(&body, state.config.chatkit.workflow_id.as_deref()) {
            Some(id) => id,
            None => return ExchangeError::MissingWorkflowId.into_response(),
        };

    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());
    let identity = session::resolve_identity(cookie_header);

    let (mut response, stamp_cookie) =
        match chatkit.create_session(&workflow_id, &identity.user_id).await {
            Ok(credentials) => {
                info!(
                    workflow_id = %workflow_id,
                    new_identity = identity.is_new,
                    "Issued ChatKit session"
                );
                ((StatusCode::OK, Json(credentials)).into_response(), true)
            }
            Err(e) => {
                let err = ExchangeError::from(e);
                let stamp = err.preserves_cookie();
                (err.into_response(), stamp)
            }
        };

    if stamp_cookie && identity.is_new {
        stamp_session_cookie(
            &mut response,
            &identity.user_id,
            state.config.chatkit.is_production(),
        );
    }

    response
}

/// Attach the Set-Cookie header for a newly minted identity.
fn stamp_session_cookie(response: &mut Response, user_id: &str, secure: bool) {
    let cookie = session::build_session_cookie(user_id, secure);
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(e) => warn!(error = %e, "Failed to render session cookie"),
    }
}

/// Parse the request body leniently: absent, malformed, and non-object
/// bodies all become an empty object so they resolve through fallbacks
/// instead of failing the request.
fn parse_request_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(serde_json::Map::new()),
    }
}

/// Resolve the workflow id: body `workflow.id`, then body `workflowId`,
/// then the configured default. A candidate counts only as a non-empty
/// string; the winner is trimmed and may still come up empty, which is
/// treated as missing.
fn resolve_workflow_id(body: &Value, default: Option<&str>) -> Option<String> {
    let from_workflow = body
        .get("workflow")
        .and_then(|workflow| workflow.get("id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty());
    let from_flat = body
        .get("workflowId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty());
    let default = default.filter(|id| !id.is_empty());

    let candidate = from_workflow.or(from_flat).or(default)?;
    let candidate = candidate.trim();
    if candidate.is_empty() {
        None
    } else {
        Some(candidate.to_string())
    }
}
