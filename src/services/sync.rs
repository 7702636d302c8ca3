//! Codeforces 同步
//!
//! `reconcile` 把一个 handle 的提交记录整理成去重后的已解决题目列表，
//! 本身不做任何持久化；`merge_solved` 由调用方在拿到结果后执行，
//! 只会向进度表追加已解决标记，不会撤销已有记录。

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::info;
use std::collections::{HashMap, HashSet};

use super::catalog::Catalog;
use super::codeforces::CodeforcesClient;
use super::database::DatabaseService;
use crate::error::SyncError;
use crate::models::{MergeReport, ProblemKey, ProgressSource, SolvedProblem, SubmissionRecord, SyncSummary};

/// 过滤出 AC 提交并按 (contestId, index) 去重
///
/// 按接口返回顺序遍历，每个键保留第一次遇到的记录。Codeforces 按时间倒序
/// 返回，所以保留的是最近一次 AC。
pub fn collect_solved(submissions: &[SubmissionRecord]) -> Vec<SolvedProblem> {
    let mut seen = HashSet::new();
    let mut solved = Vec::new();

    for submission in submissions.iter().filter(|s| s.is_accepted()) {
        let Some(key) = submission.key() else {
            continue;
        };

        if seen.insert(key.clone()) {
            solved.push(SolvedProblem {
                name: submission.problem.name.clone(),
                rating: submission.problem.rating,
                contest_id: key.contest_id,
                index: key.index,
                solved_at: submission.creation_time_seconds,
            });
        }
    }

    solved
}

/// 同步一个 handle
pub async fn reconcile(client: &CodeforcesClient, handle: &str) -> Result<SyncSummary, SyncError> {
    let handle = handle.trim();
    if handle.is_empty() {
        info!("No handle provided");
        return Err(SyncError::InvalidInput);
    }

    info!("Fetching submissions for handle: {}", handle);

    let (submissions, user_info) = futures::join!(
        client.fetch_submissions(handle),
        client.fetch_user_info(handle)
    );
    let problems = collect_solved(&submissions?);

    info!("Found {} unique solved problems for {}", problems.len(), handle);

    Ok(SyncSummary {
        handle: handle.to_string(),
        total_solved: problems.len(),
        problems,
        rating: user_info.rating,
        rank: user_info.rank,
    })
}

/// 把同步结果合并进用户进度
///
/// 题单中键出现在已解决集合里、且用户尚未标记的题目写入 `codeforces`
/// 来源的记录；其余题目不动。写入在同一个事务内完成，属于阻塞调用。
pub fn merge_solved(
    db: &DatabaseService,
    catalog: &Catalog,
    user_id: &str,
    summary: &SyncSummary,
) -> Result<MergeReport> {
    let solved: HashMap<ProblemKey, &SolvedProblem> =
        summary.problems.iter().map(|p| (p.key(), p)).collect();
    let keys: HashSet<ProblemKey> = solved.keys().cloned().collect();

    let entries: Vec<(String, DateTime<Utc>)> = catalog
        .matching(&keys)
        .map(|tracked| {
            let solved_at = tracked
                .key()
                .and_then(|key| solved.get(&key))
                .and_then(|p| DateTime::from_timestamp(p.solved_at, 0))
                .unwrap_or_else(Utc::now);
            (tracked.id.clone(), solved_at)
        })
        .collect();

    let newly_solved = db.mark_solved_if_absent(user_id, &entries, ProgressSource::Codeforces)?;
    let report = MergeReport {
        matched: entries.len(),
        already_solved: entries.len() - newly_solved.len(),
        newly_solved,
    };

    info!(
        "Merged sync for {}: {} matched, {} newly solved",
        user_id,
        report.matched,
        report.newly_solved.len()
    );

    Ok(report)
}
