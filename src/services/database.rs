// 数据库服务模块
// 提供 SQLite 存储：用户资料（Codeforces handle）、逐题进度与收藏

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{types::Type, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{Bookmark, Profile, ProgressRecord, ProgressSource};

/// 数据库服务
#[derive(Clone)]
pub struct DatabaseService {
    pool: Arc<Mutex<Connection>>,
}

impl DatabaseService {
    /// 打开（必要时创建）数据库文件
    pub fn open(db_path: &Path) -> Result<Self> {
        // 确保数据目录存在
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        let service = Self {
            pool: Arc::new(Mutex::new(conn)),
        };

        service.initialize()?;
        Ok(service)
    }

    /// 内存数据库，测试用
    pub fn open_in_memory() -> Result<Self> {
        let service = Self {
            pool: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };

        service.initialize()?;
        Ok(service)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.pool
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    /// 初始化数据库表结构
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )
        .context("Failed to set WAL mode")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                username TEXT,
                codeforces_handle TEXT,
                rating INTEGER,
                rank TEXT,
                last_synced_at TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS problem_progress (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                problem_id TEXT NOT NULL,
                solved INTEGER NOT NULL DEFAULT 0,
                solved_at TEXT NOT NULL,
                source TEXT NOT NULL CHECK(source IN ('manual', 'codeforces')),
                UNIQUE (user_id, problem_id)
            );

            CREATE INDEX IF NOT EXISTS idx_progress_user_solved ON problem_progress(user_id, solved);

            CREATE TABLE IF NOT EXISTS bookmarks (
                user_id TEXT NOT NULL,
                problem_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (user_id, problem_id)
            );
        ",
        )
        .context("Failed to create tables")?;

        // 旧库的 profiles 没有 username 列
        let has_username = conn
            .prepare("SELECT 1 FROM pragma_table_info('profiles') WHERE name = 'username'")?
            .exists([])?;
        if !has_username {
            conn.execute("ALTER TABLE profiles ADD COLUMN username TEXT", [])
                .context("Failed to add profiles.username")?;
        }

        Ok(())
    }

    // ==================== 用户资料 ====================

    /// 保存用户的 Codeforces handle
    pub fn set_handle(&self, user_id: &str, handle: &str) -> Result<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO profiles (user_id, codeforces_handle, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                codeforces_handle = excluded.codeforces_handle,
                updated_at = excluded.updated_at",
            rusqlite::params![user_id, handle, now],
        )?;

        Ok(())
    }

    /// 保存显示用的用户名
    pub fn set_username(&self, user_id: &str, username: &str) -> Result<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO profiles (user_id, username, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                updated_at = excluded.updated_at",
            rusqlite::params![user_id, username, now],
        )?;

        Ok(())
    }

    /// 获取用户资料，附带已解决题目数
    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let conn = self.conn()?;

        let profile = conn
            .query_row(
                "SELECT user_id, codeforces_handle, rating, rank, last_synced_at, username,
                    (SELECT COUNT(*) FROM problem_progress p
                     WHERE p.user_id = profiles.user_id AND p.solved = 1)
                 FROM profiles WHERE user_id = ?1",
                rusqlite::params![user_id],
                Self::row_to_profile,
            )
            .optional()?;

        Ok(profile)
    }

    /// 记录最近一次同步得到的 rating 与 rank
    pub fn record_sync(&self, user_id: &str, rating: Option<i32>, rank: Option<&str>) -> Result<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO profiles (user_id, rating, rank, last_synced_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                rating = excluded.rating,
                rank = excluded.rank,
                last_synced_at = excluded.last_synced_at,
                updated_at = excluded.updated_at",
            rusqlite::params![user_id, rating, rank, now],
        )?;

        Ok(())
    }

    // ==================== 做题进度 ====================

    /// 标记为已解决，已有记录时覆盖时间与来源（手动勾选）
    pub fn mark_solved(
        &self,
        user_id: &str,
        problem_id: &str,
        source: ProgressSource,
        solved_at: DateTime<Utc>,
    ) -> Result<ProgressRecord> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO problem_progress (id, user_id, problem_id, solved, solved_at, source)
             VALUES (?1, ?2, ?3, 1, ?4, ?5)
             ON CONFLICT(user_id, problem_id) DO UPDATE SET
                solved = 1,
                solved_at = excluded.solved_at,
                source = excluded.source",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                user_id,
                problem_id,
                solved_at.to_rfc3339(),
                source.as_str(),
            ],
        )?;

        Ok(ProgressRecord {
            user_id: user_id.to_string(),
            problem_id: problem_id.to_string(),
            solved: true,
            solved_at,
            source,
        })
    }

    /// 批量写入尚未解决的题目，返回本次新写入的题目 id
    ///
    /// 同步合并只调用这个方法：已有的手动记录保持原样，重复调用结果不变。
    /// 整批在一个事务内完成。
    pub fn mark_solved_if_absent(
        &self,
        user_id: &str,
        entries: &[(String, DateTime<Utc>)],
        source: ProgressSource,
    ) -> Result<Vec<String>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = Vec::new();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO problem_progress (id, user_id, problem_id, solved, solved_at, source)
                 VALUES (?1, ?2, ?3, 1, ?4, ?5)
                 ON CONFLICT(user_id, problem_id) DO UPDATE SET
                    solved = 1,
                    solved_at = excluded.solved_at,
                    source = excluded.source
                 WHERE problem_progress.solved = 0",
            )?;

            for (problem_id, solved_at) in entries {
                let changed = stmt.execute(rusqlite::params![
                    Uuid::new_v4().to_string(),
                    user_id,
                    problem_id,
                    solved_at.to_rfc3339(),
                    source.as_str(),
                ])?;

                if changed > 0 {
                    inserted.push(problem_id.clone());
                }
            }
        }

        tx.commit().context("Failed to commit merge")?;
        debug!(
            "mark_solved_if_absent {}: {} of {} inserted",
            user_id,
            inserted.len(),
            entries.len()
        );

        Ok(inserted)
    }

    /// 取消标记（删除记录），返回记录是否存在
    pub fn unmark_solved(&self, user_id: &str, problem_id: &str) -> Result<bool> {
        let conn = self.conn()?;

        let deleted = conn.execute(
            "DELETE FROM problem_progress WHERE user_id = ?1 AND problem_id = ?2",
            rusqlite::params![user_id, problem_id],
        )?;

        Ok(deleted > 0)
    }

    /// 获取单题进度
    pub fn get_progress(&self, user_id: &str, problem_id: &str) -> Result<Option<ProgressRecord>> {
        let conn = self.conn()?;

        let record = conn
            .query_row(
                "SELECT user_id, problem_id, solved, solved_at, source
                 FROM problem_progress WHERE user_id = ?1 AND problem_id = ?2",
                rusqlite::params![user_id, problem_id],
                Self::row_to_progress,
            )
            .optional()?;

        Ok(record)
    }

    /// 用户所有已解决的进度记录
    pub fn list_solved(&self, user_id: &str) -> Result<Vec<ProgressRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT user_id, problem_id, solved, solved_at, source
             FROM problem_progress WHERE user_id = ?1 AND solved = 1
             ORDER BY problem_id",
        )?;

        let rows = stmt.query_map(rusqlite::params![user_id], Self::row_to_progress)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    // ==================== 收藏 ====================

    /// 收藏题目，已收藏时保留原时间
    pub fn add_bookmark(&self, user_id: &str, problem_id: &str) -> Result<Bookmark> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO bookmarks (user_id, problem_id, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, problem_id) DO NOTHING",
            rusqlite::params![user_id, problem_id, Utc::now().to_rfc3339()],
        )?;

        let bookmark = conn.query_row(
            "SELECT user_id, problem_id, created_at
             FROM bookmarks WHERE user_id = ?1 AND problem_id = ?2",
            rusqlite::params![user_id, problem_id],
            Self::row_to_bookmark,
        )?;

        Ok(bookmark)
    }

    /// 取消收藏，返回收藏是否存在
    pub fn remove_bookmark(&self, user_id: &str, problem_id: &str) -> Result<bool> {
        let conn = self.conn()?;

        let deleted = conn.execute(
            "DELETE FROM bookmarks WHERE user_id = ?1 AND problem_id = ?2",
            rusqlite::params![user_id, problem_id],
        )?;

        Ok(deleted > 0)
    }

    pub fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT user_id, problem_id, created_at
             FROM bookmarks WHERE user_id = ?1
             ORDER BY problem_id",
        )?;

        let rows = stmt.query_map(rusqlite::params![user_id], Self::row_to_bookmark)?;

        let mut bookmarks = Vec::new();
        for row in rows {
            bookmarks.push(row?);
        }

        Ok(bookmarks)
    }

    // ==================== 辅助方法 ====================

    fn row_to_profile(row: &Row) -> Result<Profile, rusqlite::Error> {
        let last_synced_at = match row.get::<_, Option<String>>(4)? {
            Some(raw) => Some(parse_timestamp(4, &raw)?),
            None => None,
        };

        let solved_count: i64 = row.get(6)?;

        Ok(Profile {
            user_id: row.get(0)?,
            username: row.get(5)?,
            codeforces_handle: row.get(1)?,
            rating: row.get(2)?,
            rank: row.get(3)?,
            last_synced_at,
            solved_count: solved_count as usize,
        })
    }

    fn row_to_bookmark(row: &Row) -> Result<Bookmark, rusqlite::Error> {
        Ok(Bookmark {
            user_id: row.get(0)?,
            problem_id: row.get(1)?,
            created_at: parse_timestamp(2, &row.get::<_, String>(2)?)?,
        })
    }

    fn row_to_progress(row: &Row) -> Result<ProgressRecord, rusqlite::Error> {
        let source_raw: String = row.get(4)?;
        let source = ProgressSource::parse(&source_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("unknown progress source: {}", source_raw).into(),
            )
        })?;

        Ok(ProgressRecord {
            user_id: row.get(0)?,
            problem_id: row.get(1)?,
            solved: row.get(2)?,
            solved_at: parse_timestamp(3, &row.get::<_, String>(3)?)?,
            source,
        })
    }
}

fn parse_timestamp(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
