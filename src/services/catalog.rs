//! 题单服务
//! 加载按难度分组的 CP-31 题单，并计算用户在题单上的进度

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::models::{
    ProblemKey, ProgressStats, RatingCategory, RatingProgress, SheetEntry, SheetFilter, TrackedProblem,
};

/// 内置题单
const BUILTIN_SHEET: &str = include_str!("../../data/cp31_sheet.json");

fn problem_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^https?://(?:www\.)?codeforces\.com/(?:problemset/problem/(\d+)/([A-Za-z][A-Za-z0-9]*)|contest/(\d+)/problem/([A-Za-z][A-Za-z0-9]*))/?$",
        )
        .expect("problem link regex is valid")
    })
}

/// 从 Codeforces 题目链接解析 (contestId, index)
pub fn parse_problem_link(link: &str) -> Option<ProblemKey> {
    let caps = problem_link_regex().captures(link.trim())?;

    let contest = caps.get(1).or_else(|| caps.get(3))?;
    let index = caps.get(2).or_else(|| caps.get(4))?;

    let contest_id = contest.as_str().parse().ok()?;
    Some(ProblemKey::new(contest_id, index.as_str().to_uppercase()))
}

#[derive(Debug, Clone)]
pub struct Catalog {
    problems: Vec<TrackedProblem>,
}

impl Catalog {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_SHEET).context("Failed to parse built-in sheet")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid catalog {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let problems: Vec<TrackedProblem> = serde_json::from_str(raw)?;
        Self::new(problems)
    }

    /// 校验 id 唯一；缺少 contestId/index 时尝试从链接补全
    pub fn new(mut problems: Vec<TrackedProblem>) -> Result<Self> {
        let mut seen = HashSet::new();

        for problem in &mut problems {
            if !seen.insert(problem.id.clone()) {
                bail!("Duplicate tracked problem id: {}", problem.id);
            }

            if problem.key().is_none() {
                if let Some(key) = parse_problem_link(&problem.link) {
                    problem.contest_id = Some(key.contest_id);
                    problem.index = Some(key.index);
                }
            }
        }

        Ok(Self { problems })
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TrackedProblem> {
        self.problems.iter().find(|p| p.id == id)
    }

    /// 所有难度，升序
    pub fn ratings(&self) -> Vec<i32> {
        let mut ratings: Vec<i32> = self.problems.iter().map(|p| p.rating).collect();
        ratings.sort_unstable();
        ratings.dedup();
        ratings
    }

    pub fn by_rating(&self, rating: i32) -> Vec<&TrackedProblem> {
        self.problems.iter().filter(|p| p.rating == rating).collect()
    }

    /// 按名称或标签关键字（不区分大小写）与难度筛选
    pub fn search(&self, query: Option<&str>, rating: Option<i32>) -> Vec<&TrackedProblem> {
        let needle = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        self.problems
            .iter()
            .filter(|p| rating.map_or(true, |r| p.rating == r))
            .filter(|p| match &needle {
                Some(needle) => {
                    p.name.to_lowercase().contains(needle.as_str())
                        || p.tags.iter().any(|t| t.to_lowercase().contains(needle.as_str()))
                }
                None => true,
            })
            .collect()
    }

    /// 按难度分组，可选关键字与难度过滤；过滤后为空的分组不返回
    pub fn grouped(&self, query: Option<&str>, rating: Option<i32>) -> Vec<RatingCategory> {
        let mut groups: BTreeMap<i32, Vec<TrackedProblem>> = BTreeMap::new();
        for problem in self.search(query, rating) {
            groups.entry(problem.rating).or_default().push(problem.clone());
        }

        groups
            .into_iter()
            .map(|(rating, problems)| RatingCategory { rating, problems })
            .collect()
    }

    /// 题单中键落在已解决集合内的题目
    pub fn matching<'a>(&'a self, solved: &'a HashSet<ProblemKey>) -> impl Iterator<Item = &'a TrackedProblem> + 'a {
        self.problems
            .iter()
            .filter(move |p| p.key().is_some_and(|key| solved.contains(&key)))
    }

    /// 带用户解决与收藏状态的题单视图
    pub fn sheet(
        &self,
        filter: &SheetFilter,
        solved: &HashSet<String>,
        bookmarked: &HashSet<String>,
    ) -> Vec<SheetEntry> {
        self.search(filter.q.as_deref(), filter.rating)
            .into_iter()
            .map(|problem| SheetEntry {
                solved: solved.contains(&problem.id),
                bookmarked: bookmarked.contains(&problem.id),
                problem: problem.clone(),
            })
            .filter(|entry| !filter.bookmarked || entry.bookmarked)
            .filter(|entry| !filter.unsolved || !entry.solved)
            .collect()
    }

    /// 按难度统计进度
    ///
    /// 不在题单里的题目 id（例如更换题单后遗留的记录）不计入。
    pub fn progress_stats(&self, solved_ids: &[String]) -> ProgressStats {
        let solved_problem_ids: Vec<String> = solved_ids
            .iter()
            .filter(|id| self.get(id).is_some())
            .cloned()
            .collect();
        let solved: HashSet<&str> = solved_problem_ids.iter().map(String::as_str).collect();

        let by_rating = self
            .ratings()
            .into_iter()
            .map(|rating| {
                let problems = self.by_rating(rating);
                RatingProgress {
                    rating,
                    solved: problems.iter().filter(|p| solved.contains(p.id.as_str())).count(),
                    total: problems.len(),
                }
            })
            .collect();

        ProgressStats {
            total_tracked: self.problems.len(),
            total_solved: solved.len(),
            by_rating,
            solved_problem_ids,
        }
    }
}
