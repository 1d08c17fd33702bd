//! HTTP surface for the assistant.
//!
//! ## Endpoints
//!
//! - `GET /`: liveness probe
//! - `POST /api/chat`: run one chat turn

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn};

use crate::config::ServerConfig;
use crate::error::{AssistantError, Result};
use crate::model::ChatRequest;
use crate::observability::{FIELD_ERROR_CODE, SPAN_HTTP_REQUEST};
use crate::pipeline::Orchestrator;

/// Body of every 500 response. Internal detail stays in the log.
pub const INTERNAL_ERROR_DETAIL: &str = "An internal error occurred while processing the request.";

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// Build the CORS layer. An empty list or `"*"` allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %o, "ignoring invalid CORS origin: {e}");
                None
            }
        })
        .collect();
    base.allow_origin(parsed)
}

/// Build the application router.
pub fn router(orchestrator: Arc<Orchestrator>, cors: CorsLayer) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        info_span!(SPAN_HTTP_REQUEST, method = %req.method(), path = %req.uri().path())
    });

    Router::new()
        .route("/", get(handle_health))
        .route("/api/chat", post(handle_chat))
        .with_state(AppState { orchestrator })
        .layer(cors)
        .layer(trace)
}

/// A running HTTP server.
pub struct ChatServer {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ChatServer {
    /// Bind to `{config.host}:{config.port}` (port `0` auto-assigns) and
    /// serve in a background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(orchestrator: Arc<Orchestrator>, config: &ServerConfig) -> Result<Self> {
        let app = router(orchestrator, cors_layer(&config.cors_origins));

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        let addr = listener.local_addr()?;
        info!("chat server listening on http://{addr}");

        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = stopped.await;
            });
            if let Err(e) = serve.await {
                error!("chat server error: {e}");
            }
        });

        Ok(Self {
            addr,
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!("chat server task ended abnormally: {e}");
        }
        info!("chat server on {} stopped", self.addr);
    }
}

impl Drop for ChatServer {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

/// `GET /`
async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /api/chat`
async fn handle_chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            return detail(StatusCode::UNPROCESSABLE_ENTITY, &rejection.body_text());
        }
    };

    match state.orchestrator.run(&request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(AssistantError::InvalidRequest(msg)) => detail(StatusCode::BAD_REQUEST, &msg),
        Err(e) => {
            let code = match &e {
                AssistantError::Llm(llm) => llm.code(),
                _ => "INTERNAL",
            };
            error!({ FIELD_ERROR_CODE } = code, "chat turn failed: {e}");
            detail(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_DETAIL)
        }
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}
