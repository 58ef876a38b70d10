// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::access::{AccessGate, AccessState, FreePass};
use crate::config::{MapConfig, PulseConfig};
use crate::feed::SessionSnapshot;
use crate::intel::DynIntelClient;
use crate::metrics::Metrics;
use crate::registry::{RegistryError, RegistryLimits, SessionRegistry};
use crate::session::{CycleOutcome, Session, SessionError, SessionSettings};
use crate::views::{self, KeywordWeight, MapView, TickerEntry};

/// Request header carrying a free-access pass.
pub const PASS_HEADER: &str = "x-pulse-pass";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub gate: Arc<AccessGate>,
    pub map: Arc<MapConfig>,
}

impl AppState {
    /// Build the state and start the idle-session reaper. Needs a Tokio runtime.
    pub fn new(cfg: &PulseConfig, client: DynIntelClient, gate: AccessGate) -> Self {
        let registry = Arc::new(SessionRegistry::new(
            client,
            SessionSettings::from(&cfg.feed),
            RegistryLimits::from(&cfg.feed),
        ));
        registry.spawn_reaper();
        Self {
            registry,
            gate: Arc::new(gate),
            map: Arc::new(cfg.map.clone()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let metrics = Metrics::init();

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/access", get(get_access))
        .route("/access/connect", post(connect_access))
        .route("/access/free", post(free_access))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/search", post(search))
        .route("/sessions/{id}/refresh", post(refresh))
        .route("/sessions/{id}/ticker", get(ticker))
        .route("/sessions/{id}/keywords", get(keywords))
        .route("/sessions/{id}/map", get(map))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
        .merge(metrics.router())
}

// ---------------- errors ----------------

#[derive(Debug)]
pub enum ApiError {
    AccessRequired,
    UnknownSession,
    Session(SessionError),
    Registry(RegistryError),
    Internal(String),
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        ApiError::Session(e)
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        ApiError::Registry(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::AccessRequired => (
                StatusCode::FORBIDDEN,
                "access required: connect an API key or choose free access".to_string(),
            ),
            ApiError::UnknownSession => (StatusCode::NOT_FOUND, "unknown session".to_string()),
            ApiError::Session(e) => {
                let status = match e {
                    SessionError::EmptyQuery | SessionError::NoQuery => StatusCode::BAD_REQUEST,
                    SessionError::Busy => StatusCode::CONFLICT,
                    SessionError::Closed => StatusCode::GONE,
                };
                (status, e.to_string())
            }
            ApiError::Registry(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(ErrorBody { error: msg })).into_response()
    }
}

fn pass_of(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(PASS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

async fn ensure_access(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if state.gate.check_for(pass_of(headers)).await.allows_use() {
        Ok(())
    } else {
        Err(ApiError::AccessRequired)
    }
}

fn session_of(state: &AppState, id: &str) -> Result<Arc<Session>, ApiError> {
    state.registry.get(id).ok_or(ApiError::UnknownSession)
}

// ---------------- access ----------------

#[derive(Serialize)]
struct AccessOut {
    state: AccessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pass: Option<String>,
}

async fn get_access(State(state): State<AppState>, headers: HeaderMap) -> Json<AccessOut> {
    Json(AccessOut {
        state: state.gate.check_for(pass_of(&headers)).await,
        pass: None,
    })
}

async fn connect_access(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AccessOut>, ApiError> {
    state
        .gate
        .connect()
        .await
        .map_err(|e| ApiError::Internal(format!("credential selection failed: {e:#}")))?;
    Ok(Json(AccessOut {
        state: state.gate.check_for(pass_of(&headers)).await,
        pass: None,
    }))
}

/// Opt the caller into free access. The returned pass goes in `x-pulse-pass`.
async fn free_access(State(state): State<AppState>) -> Json<AccessOut> {
    let FreePass(pass) = state.gate.use_free_access();
    Json(AccessOut {
        state: state.gate.check_for(Some(&pass)).await,
        pass: Some(pass),
    })
}

// ---------------- sessions ----------------

#[derive(Serialize)]
struct CreatedOut {
    id: String,
    session: SessionSnapshot,
}

async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<CreatedOut>), ApiError> {
    ensure_access(&state, &headers).await?;
    let (id, session) = state.registry.create()?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedOut {
            id,
            session: session.snapshot(),
        }),
    ))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(session_of(&state, &id)?.snapshot()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.registry.remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::UnknownSession)
    }
}

#[derive(Deserialize)]
struct SearchReq {
    query: String,
}

#[derive(Serialize)]
struct CycleOut {
    /// "merged" | "failed"
    status: &'static str,
    added: usize,
    session: SessionSnapshot,
}

fn cycle_out(outcome: CycleOutcome, session: &Session) -> Json<CycleOut> {
    let (status, added) = match outcome {
        CycleOutcome::Merged(stats) => ("merged", stats.added),
        CycleOutcome::Failed(_) => ("failed", 0),
    };
    Json(CycleOut {
        status,
        added,
        session: session.snapshot(),
    })
}

async fn search(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SearchReq>,
) -> Result<Json<CycleOut>, ApiError> {
    ensure_access(&state, &headers).await?;
    let session = session_of(&state, &id)?;
    let outcome = session.submit_query(&body.query).await?;
    Ok(cycle_out(outcome, &session))
}

async fn refresh(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CycleOut>, ApiError> {
    ensure_access(&state, &headers).await?;
    let session = session_of(&state, &id)?;
    let outcome = session.refresh().await?;
    Ok(cycle_out(outcome, &session))
}

// ---------------- views ----------------

async fn ticker(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TickerEntry>>, ApiError> {
    let snap = session_of(&state, &id)?.snapshot();
    Ok(Json(views::ticker(&snap.state.results)))
}

async fn keywords(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<KeywordWeight>>, ApiError> {
    let snap = session_of(&state, &id)?.snapshot();
    Ok(Json(views::keyword_cloud(&snap.state.results)))
}

async fn map(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MapView>, ApiError> {
    let snap = session_of(&state, &id)?.snapshot();
    Ok(Json(views::map_view(&snap.state.results, &state.map)))
}
