//! Axum route handlers for the daily prompt API.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::prompt::{Prompt, PromptType};
use crate::selection::history::{
    history_page, list_prompts, page_params, HistoryPage, PromptFilter, PromptPage,
    DEFAULT_HISTORY_LIMIT, DEFAULT_PROMPT_LIMIT, MAX_HISTORY_LIMIT, MAX_PROMPT_LIMIT,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodayRequest {
    #[serde(default)]
    pub prompt_id: String,
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub prompt: Prompt,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PromptListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub prompt_type: Option<String>,
    pub source: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/prompt/today
pub async fn handle_get_today(
    State(state): State<AppState>,
) -> Result<Json<PromptResponse>, AppError> {
    let prompt = state
        .selector
        .get_today_prompt()
        .await?
        .ok_or(AppError::NoPromptAvailable)?;
    Ok(Json(PromptResponse { prompt }))
}

/// PUT /api/v1/prompt/today
///
/// Replaces today's pick with an explicit prompt from the latest snapshot.
pub async fn handle_update_today(
    State(state): State<AppState>,
    Json(request): Json<UpdateTodayRequest>,
) -> Result<Json<PromptResponse>, AppError> {
    let prompt_id = request.prompt_id.trim();
    if prompt_id.is_empty() {
        return Err(AppError::Validation("promptId is required".to_string()));
    }

    let prompt = state
        .selector
        .update_today_prompt(prompt_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Prompt {prompt_id} not found in latest snapshot"))
        })?;
    Ok(Json(PromptResponse { prompt }))
}

/// POST /api/v1/prompt/select
pub async fn handle_select(
    State(state): State<AppState>,
) -> Result<Json<PromptResponse>, AppError> {
    let prompt = state
        .selector
        .select_daily_prompt()
        .await?
        .ok_or(AppError::NoPromptAvailable)?;
    Ok(Json(PromptResponse { prompt }))
}

/// GET /api/v1/prompts/history
pub async fn handle_history(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<HistoryPage>, AppError> {
    let (page, limit) =
        page_params(query.page, query.limit, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
    let history =
        history_page(state.prompts.as_ref(), state.ledger.as_ref(), page, limit).await?;
    Ok(Json(history))
}

/// GET /api/v1/prompts/all
pub async fn handle_list_prompts(
    State(state): State<AppState>,
    Query(query): Query<PromptListQuery>,
) -> Result<Json<PromptPage>, AppError> {
    let prompt_type = match non_blank(query.prompt_type) {
        Some(raw) => Some(
            PromptType::parse(&raw)
                .ok_or_else(|| AppError::Validation(format!("Unknown prompt type '{raw}'")))?,
        ),
        None => None,
    };
    let filter = PromptFilter {
        search: non_blank(query.search),
        prompt_type,
        source: non_blank(query.source),
    };

    let (page, limit) =
        page_params(query.page, query.limit, DEFAULT_PROMPT_LIMIT, MAX_PROMPT_LIMIT);
    let prompts = list_prompts(state.prompts.as_ref(), &filter, page, limit).await?;
    Ok(Json(prompts))
}
