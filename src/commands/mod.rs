// HTTP 接口模块
// 提供供前端调用的同步、题单与进度接口

pub mod catalog;
pub mod sync;
pub mod users;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::{any::Any, sync::Arc, time::Duration};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
};

use crate::config::Config;
use crate::error::ApiError;
use crate::services::{Catalog, CodeforcesClient, DatabaseService};

/// 应用状态
pub struct AppState {
    pub config: Config,
    pub db: DatabaseService,
    pub catalog: Catalog,
    pub codeforces: CodeforcesClient,
}

pub type SharedState = Arc<AppState>;

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(catalog::health_handler))
        .route("/catalog", get(catalog::catalog_handler))
        .route("/sync-codeforces", post(sync::sync_codeforces_handler))
        .route("/users/{user_id}/profile", get(users::get_profile_handler))
        .route("/users/{user_id}/handle", put(users::set_handle_handler))
        .route("/users/{user_id}/username", put(users::set_username_handler))
        .route("/users/{user_id}/sync", post(users::sync_user_handler))
        .route("/users/{user_id}/progress", get(users::get_progress_handler))
        .route(
            "/users/{user_id}/progress/{problem_id}",
            put(users::mark_solved_handler).delete(users::unmark_solved_handler),
        )
        .route("/users/{user_id}/sheet", get(users::sheet_handler))
        .route("/users/{user_id}/bookmarks", get(users::list_bookmarks_handler))
        .route(
            "/users/{user_id}/bookmarks/{problem_id}",
            put(users::add_bookmark_handler).delete(users::remove_bookmark_handler),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    log::error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

/// 解析 JSON 请求体，无法解析时返回 None
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Option<T> {
    serde_json::from_slice(body).ok()
}

/// 查询参数解析失败时返回带 `{ error }` 的 400
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}
