// 同步接口
// POST /sync-codeforces { handle } -> 去重后的已解决题目

use axum::{body::Bytes, extract::State, Json};
use log::error;
use serde::{Deserialize, Serialize};

use super::{parse_body, SharedState};
use crate::error::SyncError;
use crate::models::SyncSummary;
use crate::services::reconcile;

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub handle: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: SyncSummary,
}

pub async fn sync_codeforces_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<SyncResponse>, SyncError> {
    // 请求体无法解析与缺少 handle 同样视为输入错误
    let handle = parse_body::<SyncRequest>(&body)
        .and_then(|request| request.handle)
        .unwrap_or_default();

    match reconcile(&state.codeforces, &handle).await {
        Ok(summary) => Ok(Json(SyncResponse {
            success: true,
            summary,
        })),
        Err(e) => {
            if let SyncError::Internal(detail) = &e {
                error!("Error in sync-codeforces: {}", detail);
            }
            Err(e)
        }
    }
}
