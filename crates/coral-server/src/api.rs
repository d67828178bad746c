use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method},
    routing::{get, post},
    Json, Router,
};
use coral_shared::{Category, ContributionEvent, LevelTable, UserId};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::ranking::RankedUser;
use crate::service::{AwardRequest, ContributionService};
use crate::summary::UserContributionSummary;

#[derive(Clone)]
pub struct AppState {
    pub service: ContributionService,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/levels", get(level_table))
        .route("/categories", get(categories))
        .route("/leaderboard", get(leaderboard))
        .route("/users/:user_id/summary", get(user_summary))
        .route("/users/:user_id/rank", get(user_rank))
        .route("/users/:user_id/history", get(user_history))
        .route("/contributions", post(award))
        .route("/admin/corrections", post(admin_correction))
        .route("/admin/reconcile", post(admin_reconcile))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct CategoryInfo {
    name: Category,
    label: String,
    icon: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RankResponse {
    user_id: UserId,
    rank: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReconcileResponse {
    users: usize,
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
    before: Option<u64>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn level_table(State(state): State<AppState>) -> Json<LevelTable> {
    Json(state.service.level_table().clone())
}

async fn categories() -> Json<Vec<CategoryInfo>> {
    Json(
        Category::ALL
            .into_iter()
            .map(|category| CategoryInfo {
                name: category,
                label: category.label(),
                icon: category.icon(),
            })
            .collect(),
    )
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Vec<RankedUser>> {
    let limit = query.limit.unwrap_or(state.config.max_top_k);
    Json(state.service.top(limit).await)
}

async fn user_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserContributionSummary>, ApiError> {
    Ok(Json(state.service.summary(&user_id).await?))
}

async fn user_rank(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<RankResponse>, ApiError> {
    let rank = state.service.rank(&user_id).await?;
    let user_id = UserId::parse(&user_id).map_err(crate::error::ContributionError::from)?;
    Ok(Json(RankResponse { user_id, rank }))
}

async fn user_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ContributionEvent>>, ApiError> {
    let events = state
        .service
        .history(&user_id, query.limit, query.before)
        .await?;
    Ok(Json(events))
}

/// Ordinary awards only ever add points.
async fn award(
    State(state): State<AppState>,
    Json(request): Json<AwardRequest>,
) -> Result<Json<UserContributionSummary>, ApiError> {
    if request.amount < 0 {
        return Err(ApiError::BadRequest(
            "negative amounts are administrative corrections".into(),
        ));
    }
    Ok(Json(state.service.award(request).await?))
}

async fn admin_correction(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(request): Json<AwardRequest>,
) -> Result<Json<UserContributionSummary>, ApiError> {
    verify_admin_token(&headers, &state.config)?;

    let user = request.user_id.clone();
    let amount = request.amount;
    let summary = state.service.award(request).await?;

    info!(user = %user, amount, "Admin applied correction");
    Ok(Json(summary))
}

async fn admin_reconcile(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    verify_admin_token(&headers, &state.config)?;

    let users = state.service.reconcile().await?;
    info!(users, "Admin triggered ledger reconcile");
    Ok(Json(ReconcileResponse { users }))
}

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ApiError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ApiError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    // Constant-time comparison to prevent timing attacks on admin token.
    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ApiError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
