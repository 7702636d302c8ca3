use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use cp_tracker::commands::{build_router, AppState};
use cp_tracker::config::Config;
use cp_tracker::models::TrackedProblem;
use cp_tracker::services::{Catalog, CodeforcesClient, DatabaseService};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn tracked(id: &str, contest_id: i64, index: &str, rating: i32) -> TrackedProblem {
    TrackedProblem {
        id: id.to_string(),
        name: id.to_string(),
        contest_id: Some(contest_id),
        index: Some(index.to_string()),
        rating,
        link: format!("https://codeforces.com/problemset/problem/{}/{}", contest_id, index),
        tags: vec![],
    }
}

fn router_for(server: &MockServer) -> Router {
    let catalog = Catalog::new(vec![
        tracked("800-1", 4, "A", 800),
        tracked("800-2", 71, "A", 800),
        tracked("900-1", 158, "B", 900),
    ])
    .expect("catalog");

    let state = Arc::new(AppState {
        config: Config::default(),
        db: DatabaseService::open_in_memory().expect("db"),
        catalog,
        codeforces: CodeforcesClient::new(&server.base_url(), 1000).expect("client"),
    });

    build_router(state)
}

fn submission(contest_id: i64, index: &str, name: &str, verdict: &str, t: i64) -> Value {
    json!({
        "id": t,
        "contestId": contest_id,
        "problem": { "contestId": contest_id, "index": index, "name": name, "rating": 800 },
        "verdict": verdict,
        "creationTimeSeconds": t
    })
}

async fn mock_judge(server: &MockServer, handle: &'static str) {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/user.status").query_param("handle", handle);
            then.status(200).json_body(json!({
                "status": "OK",
                "result": [
                    submission(4, "A", "Watermelon", "OK", 300),
                    submission(4, "A", "Watermelon", "WRONG_ANSWER", 250),
                    submission(158, "B", "Taxi", "OK", 200),
                    submission(4, "A", "Watermelon", "OK", 100),
                    submission(1, "A", "Theatre Square", "TIME_LIMIT_EXCEEDED", 50)
                ]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/user.info").query_param("handles", handle);
            then.status(200).json_body(json!({
                "status": "OK",
                "result": [{ "handle": handle, "rating": 1500, "rank": "specialist" }]
            }));
        })
        .await;
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_raw(router, method, uri, body.map(|value| value.to_string())).await
}

async fn send_raw(router: &Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(raw) => {
            builder = builder.header("content-type", "application/json");
            Body::from(raw)
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("call");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };

    (status, value)
}

#[tokio::test]
async fn sync_codeforces_returns_deduplicated_summary() {
    let server = MockServer::start_async().await;
    mock_judge(&server, "tourist").await;
    let router = router_for(&server);

    let (status, body) = send(&router, "POST", "/sync-codeforces", Some(json!({ "handle": "tourist" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["handle"], "tourist");
    assert_eq!(body["totalSolved"], 2);
    assert_eq!(body["rating"], 1500);
    assert_eq!(body["rank"], "specialist");
    assert_eq!(
        body["problems"][0],
        json!({ "name": "Watermelon", "rating": 800, "contestId": 4, "index": "A", "solvedAt": 300 })
    );
    assert_eq!(body["problems"][1]["contestId"], 158);
}

#[tokio::test]
async fn sync_codeforces_requires_handle() {
    let server = MockServer::start_async().await;
    let router = router_for(&server);

    let (status, body) = send(&router, "POST", "/sync-codeforces", Some(json!({ "handle": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Codeforces handle is required");

    let (status, _) = send(&router, "POST", "/sync-codeforces", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sync_codeforces_reports_upstream_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/user.status").query_param("handle", "ghost");
            then.status(200).json_body(json!({
                "status": "FAILED",
                "comment": "handle: User with handle ghost not found"
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/user.status").query_param("handle", "down");
            then.status(502);
        })
        .await;
    let router = router_for(&server);

    let (status, body) = send(&router, "POST", "/sync-codeforces", Some(json!({ "handle": "ghost" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "handle: User with handle ghost not found");

    let (status, body) = send(&router, "POST", "/sync-codeforces", Some(json!({ "handle": "down" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to fetch from Codeforces API");
}

#[tokio::test]
async fn cors_preflight_is_permissive() {
    let server = MockServer::start_async().await;
    let router = router_for(&server);

    let response = router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/sync-codeforces")
                .header("origin", "https://example.com")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "authorization,content-type,apikey")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("call");

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    let allowed = headers["access-control-allow-headers"].to_str().expect("header");
    assert!(allowed.contains("apikey"));
    assert!(allowed.contains("x-client-info"));
}

#[tokio::test]
async fn user_sync_merges_into_progress() {
    let server = MockServer::start_async().await;
    mock_judge(&server, "tourist").await;
    let router = router_for(&server);

    let (status, _) = send(&router, "POST", "/users/u1/sync", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, profile) = send(&router, "PUT", "/users/u1/handle", Some(json!({ "handle": " tourist " }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["codeforcesHandle"], "tourist");

    // 手动标记的题目不受同步影响
    let (status, record) = send(&router, "PUT", "/users/u1/progress/800-2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["source"], "manual");

    let (status, body) = send(&router, "POST", "/users/u1/sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["totalSolved"], 2);
    assert_eq!(body["merge"]["matched"], 2);
    assert_eq!(body["merge"]["newlySolved"], json!(["800-1", "900-1"]));

    let (_, again) = send(&router, "POST", "/users/u1/sync", None).await;
    assert_eq!(again["merge"]["newlySolved"], json!([]));
    assert_eq!(again["merge"]["alreadySolved"], 2);

    let (status, progress) = send(&router, "GET", "/users/u1/progress", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["totalSolved"], 3);
    assert_eq!(progress["solvedProblemIds"], json!(["800-1", "800-2", "900-1"]));
    assert_eq!(progress["byRating"][0], json!({ "rating": 800, "solved": 2, "total": 2 }));

    let (_, profile) = send(&router, "GET", "/users/u1/profile", None).await;
    assert_eq!(profile["rating"], 1500);
    assert_eq!(profile["rank"], "specialist");
}

#[tokio::test]
async fn manual_progress_toggle() {
    let server = MockServer::start_async().await;
    let router = router_for(&server);

    let (status, _) = send(&router, "PUT", "/users/u1/progress/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&router, "PUT", "/users/u1/progress/900-1", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, progress) = send(&router, "GET", "/users/u1/progress", None).await;
    assert_eq!(progress["totalSolved"], 1);

    let (status, _) = send(&router, "DELETE", "/users/u1/progress/900-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, progress) = send(&router, "GET", "/users/u1/progress", None).await;
    assert_eq!(progress["totalSolved"], 0);

    let (status, _) = send(&router, "GET", "/users/u2/profile", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_is_grouped_by_rating() {
    let server = MockServer::start_async().await;
    let router = router_for(&server);

    let (status, body) = send(&router, "GET", "/catalog", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["rating"], 800);
    assert_eq!(body[0]["problems"].as_array().map(Vec::len), Some(2));
    assert_eq!(body[1]["rating"], 900);
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let server = MockServer::start_async().await;
    let router = router_for(&server);

    let (status, body) = send_raw(&router, "PUT", "/users/u1/handle", Some("not json".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Codeforces handle is required");

    let (status, body) = send_raw(&router, "PUT", "/users/u1/username", Some("{".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username is required");

    let (status, body) = send(&router, "GET", "/users/u1/sheet?rating=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(&router, "GET", "/users/u1/profile", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_shows_username_and_solved_count() {
    let server = MockServer::start_async().await;
    let router = router_for(&server);

    let (status, profile) = send(&router, "PUT", "/users/u1/username", Some(json!({ "username": " alice " }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice");
    assert_eq!(profile["solvedCount"], 0);

    send(&router, "PUT", "/users/u1/progress/800-1", None).await;
    send(&router, "PUT", "/users/u1/progress/900-1", None).await;

    let (_, profile) = send(&router, "GET", "/users/u1/profile", None).await;
    assert_eq!(profile["username"], "alice");
    assert_eq!(profile["codeforcesHandle"], Value::Null);
    assert_eq!(profile["solvedCount"], 2);
}

#[tokio::test]
async fn bookmarks_and_sheet_filters() {
    let server = MockServer::start_async().await;
    let router = router_for(&server);

    let (status, _) = send(&router, "PUT", "/users/u1/bookmarks/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, bookmark) = send(&router, "PUT", "/users/u1/bookmarks/900-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bookmark["problemId"], "900-1");
    send(&router, "PUT", "/users/u1/bookmarks/800-2", None).await;
    send(&router, "PUT", "/users/u1/progress/800-2", None).await;

    let (_, bookmarks) = send(&router, "GET", "/users/u1/bookmarks", None).await;
    let ids: Vec<&str> = bookmarks
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|b| b["problemId"].as_str())
        .collect();
    assert_eq!(ids, vec!["800-2", "900-1"]);

    let (status, sheet) = send(&router, "GET", "/users/u1/sheet", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sheet.as_array().map(Vec::len), Some(3));
    assert_eq!(sheet[1]["id"], "800-2");
    assert_eq!(sheet[1]["solved"], true);
    assert_eq!(sheet[1]["bookmarked"], true);

    let (_, saved) = send(&router, "GET", "/users/u1/sheet?bookmarked=true", None).await;
    assert_eq!(saved.as_array().map(Vec::len), Some(2));

    let (_, todo) = send(&router, "GET", "/users/u1/sheet?bookmarked=true&unsolved=true", None).await;
    assert_eq!(todo.as_array().map(Vec::len), Some(1));
    assert_eq!(todo[0]["id"], "900-1");

    let (_, rated) = send(&router, "GET", "/users/u1/sheet?rating=800&q=800-1", None).await;
    assert_eq!(rated.as_array().map(Vec::len), Some(1));
    assert_eq!(rated[0]["solved"], false);

    let (status, _) = send(&router, "DELETE", "/users/u1/bookmarks/900-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, saved) = send(&router, "GET", "/users/u1/sheet?bookmarked=true", None).await;
    assert_eq!(saved.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn catalog_search_filters_groups() {
    let server = MockServer::start_async().await;
    let router = router_for(&server);

    let (status, body) = send(&router, "GET", "/catalog?q=900", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["rating"], 900);

    let (_, body) = send(&router, "GET", "/catalog?rating=800", None).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["problems"].as_array().map(Vec::len), Some(2));

    let (_, body) = send(&router, "GET", "/catalog?q=nothing-matches", None).await;
    assert_eq!(body, json!([]));
}
