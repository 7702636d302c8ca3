//! Codeforces API 客户端
//! 只封装同步需要的两个公开接口：user.status 与 user.info

use anyhow::{anyhow, Context, Error};
use log::{info, warn};
use reqwest::Client;

use crate::error::SyncError;
use crate::models::{ApiEnvelope, SubmissionRecord, UserInfo};

const USER_AGENT: &str = concat!("cp-tracker/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct CodeforcesClient {
    http_client: Client,
    base_url: String,
    submission_count: u32,
}

impl CodeforcesClient {
    pub fn new(base_url: &str, submission_count: u32) -> Result<Self, Error> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            submission_count,
        })
    }

    /// 拉取最近的提交记录（from=1, count=submission_count）
    ///
    /// 传输失败或非 2xx 视为上游不可用；接口返回 status != "OK" 时带上
    /// comment 作为拒绝原因。
    pub async fn fetch_submissions(&self, handle: &str) -> Result<Vec<SubmissionRecord>, SyncError> {
        let url = format!("{}/user.status", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("handle", handle)])
            .query(&[("from", 1), ("count", self.submission_count)])
            .send()
            .await
            .map_err(|e| {
                warn!("Codeforces request failed: {}", e);
                SyncError::UpstreamUnavailable
            })?;

        if !response.status().is_success() {
            warn!("Codeforces API error: {}", response.status());
            return Err(SyncError::UpstreamUnavailable);
        }

        let envelope = response
            .json::<ApiEnvelope<Vec<SubmissionRecord>>>()
            .await
            .map_err(|e| SyncError::Internal(format!("Failed to decode user.status: {}", e)))?;

        if envelope.status != "OK" {
            let comment = envelope
                .comment
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "Codeforces API error".to_string());
            info!("Codeforces API returned error: {}", comment);
            return Err(SyncError::UpstreamRejected(comment));
        }

        envelope
            .result
            .ok_or_else(|| SyncError::Internal("user.status returned no result".to_string()))
    }

    /// 拉取当前 rating 与 rank，任何失败都降级为空
    pub async fn fetch_user_info(&self, handle: &str) -> UserInfo {
        match self.try_fetch_user_info(handle).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Ignoring user.info failure for {}: {:#}", handle, e);
                UserInfo::default()
            }
        }
    }

    async fn try_fetch_user_info(&self, handle: &str) -> Result<UserInfo, Error> {
        let url = format!("{}/user.info", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("handles", handle)])
            .send()
            .await?
            .error_for_status()?;

        let envelope = response.json::<ApiEnvelope<Vec<UserInfo>>>().await?;
        if envelope.status != "OK" {
            return Err(anyhow!(
                "user.info status {}: {}",
                envelope.status,
                envelope.comment.unwrap_or_default()
            ));
        }

        envelope
            .result
            .and_then(|users| users.into_iter().next())
            .ok_or_else(|| anyhow!("user.info returned no users"))
    }
}
