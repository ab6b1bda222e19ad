use anyhow::{anyhow, bail};
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use medbot_shared::{ChatRequest, ChatResponse};
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::UpstreamError;
use crate::llm::{LlmService, FALLBACK_REPLY};

/// How upstream failures are exposed to clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Always 200; failures become the fallback reply.
    #[default]
    Lenient,
    /// Failures become 500 with a generic `Error: ...` reply.
    Strict,
}

impl ErrorPolicy {
    pub fn respond(self, outcome: Result<String, UpstreamError>) -> (StatusCode, ChatResponse) {
        match (self, outcome) {
            (_, Ok(reply)) => (StatusCode::OK, ChatResponse { reply }),
            (ErrorPolicy::Lenient, Err(_)) => (
                StatusCode::OK,
                ChatResponse {
                    reply: FALLBACK_REPLY.to_string(),
                },
            ),
            (ErrorPolicy::Strict, Err(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ChatResponse {
                    reply: format!("Error: {}", e.public_message()),
                },
            ),
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(ErrorPolicy::Lenient),
            "strict" => Ok(ErrorPolicy::Strict),
            other => Err(anyhow!(
                "Unknown ERROR_POLICY {:?} (expected \"lenient\" or \"strict\")",
                other
            )),
        }
    }
}

/// Origins echoed in `Access-Control-Allow-Origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    fn to_allow_origin(&self) -> anyhow::Result<AllowOrigin> {
        match self {
            AllowedOrigins::Any => Ok(AllowOrigin::any()),
            AllowedOrigins::List(origins) => {
                let values = origins
                    .iter()
                    .map(|origin| {
                        HeaderValue::from_str(origin)
                            .map_err(|e| anyhow!("Invalid CORS origin {:?}: {}", origin, e))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                // A single origin is always sent, whatever the request's Origin header says.
                match <[HeaderValue; 1]>::try_from(values) {
                    Ok([value]) => Ok(AllowOrigin::exact(value)),
                    Err(values) => Ok(AllowOrigin::list(values)),
                }
            }
        }
    }
}

impl FromStr for AllowedOrigins {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let origins: Vec<String> = s
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() {
            bail!("CORS_ALLOWED_ORIGINS must not be empty");
        }
        if origins.iter().any(|origin| origin == "*") {
            return Ok(AllowedOrigins::Any);
        }
        Ok(AllowedOrigins::List(origins))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<LlmService>,
    pub policy: ErrorPolicy,
}

pub fn cors_layer(origins: &AllowedOrigins) -> anyhow::Result<CorsLayer> {
    Ok(CorsLayer::new()
        .allow_origin(origins.to_allow_origin()?)
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::POST, Method::OPTIONS]))
}

pub fn router(state: AppState, origins: &AllowedOrigins) -> anyhow::Result<Router> {
    Ok(Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(origins)?),
        )
        .with_state(state))
}

async fn health() -> &'static str {
    "OK"
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    debug!("Relaying message ({} chars)", request.message.chars().count());

    let outcome = state.llm.complete(&request.message).await;
    let (status, response) = state.policy.respond(outcome);

    info!(status = status.as_u16(), model = state.llm.model(), "Chat request completed");
    (status, Json(response))
}
