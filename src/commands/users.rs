// 用户接口
// 资料与 handle 管理、手动勾选、收藏、题单视图、进度统计以及服务端同步合并

use anyhow::anyhow;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{parse_body, query_params, SharedState};
use crate::error::{ApiError, SyncError};
use crate::models::{
    Bookmark, MergeReport, Profile, ProgressRecord, ProgressSource, ProgressStats, SheetEntry,
    SheetFilter, SyncSummary,
};
use crate::services::{merge_solved, reconcile};

#[derive(Debug, Deserialize)]
pub struct SetHandleRequest {
    #[serde(default)]
    pub handle: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetUsernameRequest {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSyncResponse {
    pub summary: SyncSummary,
    pub merge: MergeReport,
}

fn load_profile(state: &SharedState, user_id: &str) -> Result<Json<Profile>, ApiError> {
    state
        .db
        .get_profile(user_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Profile {}", user_id)))
}

fn ensure_tracked(state: &SharedState, problem_id: &str) -> Result<(), ApiError> {
    match state.catalog.get(problem_id) {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound(format!("Problem {}", problem_id))),
    }
}

/// 获取用户资料
pub async fn get_profile_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    load_profile(&state, &user_id)
}

/// 保存 Codeforces handle
///
/// 请求体无法解析与缺少 handle 同样视为输入错误。
pub async fn set_handle_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    body: Bytes,
) -> Result<Json<Profile>, ApiError> {
    let handle = parse_body::<SetHandleRequest>(&body)
        .and_then(|request| request.handle)
        .unwrap_or_default();
    let handle = handle.trim();
    if handle.is_empty() {
        return Err(SyncError::InvalidInput.into());
    }

    state.db.set_handle(&user_id, handle)?;
    load_profile(&state, &user_id)
}

/// 保存用户名
pub async fn set_username_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    body: Bytes,
) -> Result<Json<Profile>, ApiError> {
    let username = parse_body::<SetUsernameRequest>(&body)
        .and_then(|request| request.username)
        .unwrap_or_default();
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is required".to_string()));
    }

    state.db.set_username(&user_id, username)?;
    load_profile(&state, &user_id)
}

/// 用已保存的 handle 同步并合并进度
pub async fn sync_user_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserSyncResponse>, ApiError> {
    let handle = state
        .db
        .get_profile(&user_id)?
        .and_then(|profile| profile.codeforces_handle)
        .ok_or_else(|| ApiError::BadRequest("Please set your Codeforces handle first".to_string()))?;

    let summary = reconcile(&state.codeforces, &handle).await?;

    // SQLite 写入是阻塞的，放到阻塞线程池执行
    let response = tokio::task::spawn_blocking(move || {
        let merge = merge_solved(&state.db, &state.catalog, &user_id, &summary)?;
        state
            .db
            .record_sync(&user_id, summary.rating, summary.rank.as_deref())?;
        Ok::<_, anyhow::Error>(UserSyncResponse { summary, merge })
    })
    .await
    .map_err(|e| anyhow!("Merge task failed: {}", e))??;

    Ok(Json(response))
}

/// 题单进度统计
pub async fn get_progress_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProgressStats>, ApiError> {
    let solved_ids: Vec<String> = state
        .db
        .list_solved(&user_id)?
        .into_iter()
        .map(|record| record.problem_id)
        .collect();

    Ok(Json(state.catalog.progress_stats(&solved_ids)))
}

/// 手动标记已解决
pub async fn mark_solved_handler(
    State(state): State<SharedState>,
    Path((user_id, problem_id)): Path<(String, String)>,
) -> Result<Json<ProgressRecord>, ApiError> {
    ensure_tracked(&state, &problem_id)?;

    let record = state
        .db
        .mark_solved(&user_id, &problem_id, ProgressSource::Manual, Utc::now())?;

    Ok(Json(record))
}

/// 手动取消标记
pub async fn unmark_solved_handler(
    State(state): State<SharedState>,
    Path((user_id, problem_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    ensure_tracked(&state, &problem_id)?;

    state.db.unmark_solved(&user_id, &problem_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// 带解决与收藏状态的题单，支持 `q`、`rating`、`bookmarked`、`unsolved`
pub async fn sheet_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    query: Result<Query<SheetFilter>, QueryRejection>,
) -> Result<Json<Vec<SheetEntry>>, ApiError> {
    let filter = query_params(query)?;

    let solved: HashSet<String> = state
        .db
        .list_solved(&user_id)?
        .into_iter()
        .map(|record| record.problem_id)
        .collect();
    let bookmarked: HashSet<String> = state
        .db
        .list_bookmarks(&user_id)?
        .into_iter()
        .map(|bookmark| bookmark.problem_id)
        .collect();

    Ok(Json(state.catalog.sheet(&filter, &solved, &bookmarked)))
}

pub async fn list_bookmarks_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Bookmark>>, ApiError> {
    Ok(Json(state.db.list_bookmarks(&user_id)?))
}

/// 收藏题目
pub async fn add_bookmark_handler(
    State(state): State<SharedState>,
    Path((user_id, problem_id)): Path<(String, String)>,
) -> Result<Json<Bookmark>, ApiError> {
    ensure_tracked(&state, &problem_id)?;
    Ok(Json(state.db.add_bookmark(&user_id, &problem_id)?))
}

/// 取消收藏
pub async fn remove_bookmark_handler(
    State(state): State<SharedState>,
    Path((user_id, problem_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    ensure_tracked(&state, &problem_id)?;

    state.db.remove_bookmark(&user_id, &problem_id)?;
    Ok(StatusCode::NO_CONTENT)
}
