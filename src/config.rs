// 服务配置
// 从环境变量读取，缺省时使用默认值

use anyhow::{Context, Result};
use log::LevelFilter;
use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use crate::utils::get_database_path;

pub const DEFAULT_CODEFORCES_API_URL: &str = "https://codeforces.com/api";

/// user.status 单次拉取上限，更早的提交不会被同步
pub const DEFAULT_SUBMISSION_COUNT: u32 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    /// 为空时使用内置 CP-31 题单
    pub catalog_path: Option<PathBuf>,
    pub codeforces_api_url: String,
    pub submission_count: u32,
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8787,
            database_path: get_database_path(),
            catalog_path: None,
            codeforces_api_url: DEFAULT_CODEFORCES_API_URL.to_string(),
            submission_count: DEFAULT_SUBMISSION_COUNT,
            log_level: LevelFilter::Info,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            port: try_load("CP_TRACKER_PORT", defaults.port)?,
            database_path: var("CP_TRACKER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            catalog_path: var("CP_TRACKER_CATALOG").map(PathBuf::from),
            codeforces_api_url: var("CODEFORCES_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.codeforces_api_url),
            submission_count: try_load("CODEFORCES_SUBMISSION_COUNT", defaults.submission_count)?,
            log_level: try_load("CP_TRACKER_LOG", defaults.log_level)?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid {key} value: {raw}")),
        None => Ok(default),
    }
}
