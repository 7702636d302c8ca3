use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{query_params, SharedState};
use crate::error::ApiError;
use crate::models::RatingCategory;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogQuery {
    pub q: Option<String>,
    pub rating: Option<i32>,
}

pub async fn health_handler(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "trackedProblems": state.catalog.len(),
        "submissionCount": state.config.submission_count,
    }))
}

/// 按难度分组的题单，支持 `q`（名称/标签）与 `rating` 过滤
pub async fn catalog_handler(
    State(state): State<SharedState>,
    query: Result<Query<CatalogQuery>, QueryRejection>,
) -> Result<Json<Vec<RatingCategory>>, ApiError> {
    let query = query_params(query)?;
    Ok(Json(state.catalog.grouped(query.q.as_deref(), query.rating)))
}
