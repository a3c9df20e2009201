// src/api.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::discovery::{Discovery, ExportBundle};
use crate::pulse::PulseSnapshot;
use crate::research::ResearchMetrics;
use crate::sources::RawSources;
use crate::store::{
    BacklogStats, CardDraft, CardFilter, CardPatch, FeedbackRequest, FeedbackStats, GapRecord, StoreError,
};

const DEFAULT_DOMAIN: &str = "machine learning";
const DEFAULT_CARD_LIST: usize = 50;
/// Per-source cap on a caller-supplied `limit`.
pub const MAX_SOURCE_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub discovery: Discovery,
}

impl AppState {
    pub fn new(discovery: Discovery) -> Self {
        Self { discovery }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/discovery/gaps", get(get_gaps))
        .route("/discovery/sources", get(get_sources))
        .route("/discovery/metrics", get(get_metrics))
        .route("/discovery/pulse", get(get_pulse))
        .route("/discovery/cards", post(save_card).get(list_cards))
        .route("/discovery/cards/generate", post(generate_card))
        .route(
            "/discovery/cards/{id}",
            get(get_card).put(update_card).delete(delete_card),
        )
        .route("/discovery/feedback", post(post_feedback))
        .route("/discovery/feedback/stats", get(feedback_stats))
        .route("/discovery/history", get(search_history))
        .route("/discovery/backlog/stats", get(backlog_stats))
        .route("/discovery/backlog/filter", get(filter_backlog))
        .route("/discovery/export", get(export))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid value for `{field}`: {value:?}")]
    Validation { field: &'static str, value: String },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation { field, value } => ApiError::Validation { field, value },
            e @ StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::Internal(e) => ApiError::Internal(format!("{e:#}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match &self {
            ApiError::Validation { field, .. } => {
                (StatusCode::BAD_REQUEST, json!({ "error": message, "field": field }))
            }
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::Internal(_) => {
                tracing::error!(target: "api", error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
            }
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn require_domain(domain: Option<String>) -> Result<String, ApiError> {
    match domain.map(|d| d.trim().to_string()) {
        Some(d) if !d.is_empty() => Ok(d),
        other => Err(ApiError::Validation {
            field: "domain",
            value: other.unwrap_or_default(),
        }),
    }
}

fn default_limit() -> usize {
    5
}

fn default_history_limit() -> usize {
    20
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[derive(Deserialize)]
struct DomainLimitQuery {
    domain: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

async fn get_gaps(State(state): State<AppState>, Query(q): Query<DomainLimitQuery>) -> ApiResult<Vec<GapRecord>> {
    let domain = require_domain(q.domain)?;
    let gaps = state.discovery.gaps(&domain, q.limit.clamp(1, MAX_SOURCE_LIMIT)).await?;
    Ok(Json(gaps))
}

async fn get_sources(State(state): State<AppState>, Query(q): Query<DomainLimitQuery>) -> ApiResult<RawSources> {
    let domain = require_domain(q.domain)?;
    Ok(Json(state.discovery.raw_sources(&domain, q.limit.clamp(1, MAX_SOURCE_LIMIT)).await))
}

#[derive(Deserialize)]
struct DefaultDomainQuery {
    #[serde(default = "default_domain")]
    domain: String,
}

async fn get_metrics(State(state): State<AppState>, Query(q): Query<DefaultDomainQuery>) -> Json<ResearchMetrics> {
    Json(state.discovery.research_metrics(&q.domain).await)
}

async fn get_pulse(State(state): State<AppState>, Query(q): Query<DefaultDomainQuery>) -> ApiResult<PulseSnapshot> {
    Ok(Json(state.discovery.pulse_and_save(&q.domain).await?))
}

async fn export(State(state): State<AppState>, Query(q): Query<DefaultDomainQuery>) -> ApiResult<ExportBundle> {
    Ok(Json(state.discovery.export(&q.domain).await?))
}

async fn save_card(State(state): State<AppState>, Json(draft): Json<CardDraft>) -> ApiResult<Value> {
    let mut card = draft.into_record()?;
    let id = state.discovery.store.save_card(card.clone()).await?;
    card.id = id.clone();
    Ok(Json(json!({ "status": "saved", "id": id, "card": card })))
}

#[derive(Deserialize)]
struct OptionalDomainQuery {
    domain: Option<String>,
}

async fn list_cards(State(state): State<AppState>, Query(q): Query<OptionalDomainQuery>) -> ApiResult<Value> {
    let store = &state.discovery.store;
    let cards = match q.domain.filter(|d| !d.trim().is_empty()) {
        Some(domain) => store.cards_by_domain(&domain).await?,
        None => store.list_cards(DEFAULT_CARD_LIST).await?,
    };
    Ok(Json(json!({ "cards": cards })))
}

#[derive(Deserialize)]
struct GenerateRequest {
    domain: String,
    sub_topic: String,
}

async fn generate_card(State(state): State<AppState>, Json(req): Json<GenerateRequest>) -> ApiResult<GapRecord> {
    state
        .discovery
        .generate_card(&req.domain, &req.sub_topic)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::Internal("Failed to generate card".to_string()))
}

async fn get_card(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<GapRecord> {
    Ok(Json(state.discovery.store.card_by_id(&id).await?))
}

async fn update_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<CardPatch>,
) -> ApiResult<GapRecord> {
    Ok(Json(state.discovery.store.update_card(&id, patch).await?))
}

async fn delete_card(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    state.discovery.store.delete_card(&id).await?;
    Ok(Json(json!({ "status": "deleted", "id": id })))
}

async fn post_feedback(State(state): State<AppState>, Json(req): Json<FeedbackRequest>) -> ApiResult<Value> {
    let entry = req.into_entry()?;
    let id = state.discovery.store.save_feedback(entry).await?;
    Ok(Json(json!({ "status": "recorded", "id": id })))
}

async fn feedback_stats(
    State(state): State<AppState>,
    Query(q): Query<OptionalDomainQuery>,
) -> ApiResult<FeedbackStats> {
    let domain = require_domain(q.domain)?;
    Ok(Json(state.discovery.store.feedback_stats(&domain).await?))
}

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    limit: usize,
}

async fn search_history(State(state): State<AppState>, Query(q): Query<HistoryQuery>) -> ApiResult<Value> {
    let searches = state.discovery.store.search_history(q.limit).await?;
    Ok(Json(json!({ "searches": searches })))
}

async fn backlog_stats(State(state): State<AppState>) -> ApiResult<BacklogStats> {
    Ok(Json(state.discovery.store.backlog_stats().await?))
}

#[derive(Deserialize)]
struct FilterQuery {
    status: Option<String>,
    priority: Option<String>,
    domain: Option<String>,
    tags: Option<String>,
}

async fn filter_backlog(State(state): State<AppState>, Query(q): Query<FilterQuery>) -> ApiResult<Value> {
    let filter = CardFilter::parse(
        q.status.as_deref(),
        q.priority.as_deref(),
        q.domain.as_deref(),
        q.tags.as_deref(),
    )?;
    let cards = state.discovery.store.filtered_cards(&filter).await?;
    Ok(Json(json!({ "count": cards.len(), "cards": cards })))
}
