// 数据模型
// 评测机返回的提交记录、同步结果以及本地题单与进度

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 评测机的 AC 判定字符串（区分大小写）
pub const ACCEPTED_VERDICT: &str = "OK";

/// 题目唯一键 (contestId, index)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProblemKey {
    pub contest_id: i64,
    pub index: String,
}

impl ProblemKey {
    pub fn new(contest_id: i64, index: impl Into<String>) -> Self {
        Self {
            contest_id,
            index: index.into(),
        }
    }
}

impl fmt::Display for ProblemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.contest_id, self.index)
    }
}

// ==================== Codeforces API ====================

/// Codeforces API 通用响应包
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: String,
    pub comment: Option<String>,
    pub result: Option<T>,
}

/// 一次提交记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    #[serde(default)]
    pub id: i64,
    pub contest_id: Option<i64>,
    pub problem: SubmittedProblem,
    pub verdict: Option<String>,
    pub creation_time_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedProblem {
    pub contest_id: Option<i64>,
    pub index: String,
    #[serde(default)]
    pub name: String,
    pub rating: Option<i32>,
}

impl SubmissionRecord {
    pub fn is_accepted(&self) -> bool {
        self.verdict.as_deref() == Some(ACCEPTED_VERDICT)
    }

    /// 提交所属比赛，缺失时回退到题目自身的 contestId
    pub fn key(&self) -> Option<ProblemKey> {
        let contest_id = self.contest_id.or(self.problem.contest_id)?;
        Some(ProblemKey::new(contest_id, self.problem.index.clone()))
    }
}

/// user.info 的单个用户条目，未定级用户没有 rating/rank
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    pub rating: Option<i32>,
    pub rank: Option<String>,
}

// ==================== 同步结果 ====================

/// 去重后的已解决题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedProblem {
    pub name: String,
    pub rating: Option<i32>,
    pub contest_id: i64,
    pub index: String,
    /// 秒级时间戳
    pub solved_at: i64,
}

impl SolvedProblem {
    pub fn key(&self) -> ProblemKey {
        ProblemKey::new(self.contest_id, self.index.clone())
    }
}

/// 一次同步返回给调用方的汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub handle: String,
    pub total_solved: usize,
    pub problems: Vec<SolvedProblem>,
    pub rating: Option<i32>,
    pub rank: Option<String>,
}

// ==================== 题单与进度 ====================

/// 题单中的题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedProblem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub contest_id: Option<i64>,
    #[serde(default)]
    pub index: Option<String>,
    pub rating: i32,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TrackedProblem {
    pub fn key(&self) -> Option<ProblemKey> {
        match (self.contest_id, self.index.as_deref()) {
            (Some(contest_id), Some(index)) => Some(ProblemKey::new(contest_id, index)),
            _ => None,
        }
    }
}

/// 同一难度下的题目分组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingCategory {
    pub rating: i32,
    pub problems: Vec<TrackedProblem>,
}

/// 进度来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressSource {
    Manual,
    Codeforces,
}

impl ProgressSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressSource::Manual => "manual",
            ProgressSource::Codeforces => "codeforces",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(ProgressSource::Manual),
            "codeforces" => Some(ProgressSource::Codeforces),
            _ => None,
        }
    }
}

/// 用户在某道题上的进度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub user_id: String,
    pub problem_id: String,
    pub solved: bool,
    pub solved_at: DateTime<Utc>,
    pub source: ProgressSource,
}

/// 用户资料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub username: Option<String>,
    pub codeforces_handle: Option<String>,
    pub rating: Option<i32>,
    pub rank: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// 已解决题目数，读取时统计
    #[serde(default)]
    pub solved_count: usize,
}

/// 收藏的题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub user_id: String,
    pub problem_id: String,
    pub created_at: DateTime<Utc>,
}

/// 题单过滤条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SheetFilter {
    /// 名称或标签关键字，不区分大小写
    pub q: Option<String>,
    pub rating: Option<i32>,
    /// 只看收藏
    pub bookmarked: bool,
    /// 隐藏已解决
    pub unsolved: bool,
}

/// 带用户状态的题单条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetEntry {
    #[serde(flatten)]
    pub problem: TrackedProblem,
    pub solved: bool,
    pub bookmarked: bool,
}

/// 合并结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// 题单中出现在已解决集合里的题目数
    pub matched: usize,
    pub newly_solved: Vec<String>,
    pub already_solved: usize,
}

/// 单个难度分组的进度
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingProgress {
    pub rating: i32,
    pub solved: usize,
    pub total: usize,
}

/// 进度统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total_tracked: usize,
    pub total_solved: usize,
    pub by_rating: Vec<RatingProgress>,
    pub solved_problem_ids: Vec<String>,
}
