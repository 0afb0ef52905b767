// ==========================================
// 飞行训练排班系统 - 排班版本 SQLite 仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 存储: roster_version 表, 快照/差异/未落位列表存 JSON 文本
// 并发: 读最新 seq + 插入 在同一事务内完成
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::roster::RosterVersion;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::roster_store::{check_chain, RosterVersionStore};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"SELECT week_start, seq, parent_seq, disruption_id, churn,
       churn_exceeded, slots_json, diff_json, unplaced_json, committed_at, disruption_kind
  FROM roster_version"#;

// ==========================================
// SqliteRosterVersionRepository
// ==========================================
pub struct SqliteRosterVersionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRosterVersionRepository {
    /// 基于已有连接创建 (确保表结构存在)
    pub fn new(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 打开数据库文件
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Self::new(Arc::new(Mutex::new(conn)))
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 已登记的排班周
    pub fn list_weeks(&self) -> RepositoryResult<Vec<NaiveDate>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT week_start FROM roster_version ORDER BY week_start")?;
        let weeks = stmt
            .query_map([], |row| row.get::<_, NaiveDate>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(weeks)
    }
}

/// 行 → 原始列 (JSON 解析在闭包外完成, 以便保留 serde 错误信息)
struct RawVersionRow {
    week_start: NaiveDate,
    seq: u32,
    parent_seq: Option<u32>,
    disruption_id: Option<String>,
    churn: f64,
    churn_exceeded: bool,
    slots_json: String,
    diff_json: String,
    unplaced_json: String,
    committed_at: NaiveDateTime,
    disruption_kind: Option<String>,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<RawVersionRow> {
    Ok(RawVersionRow {
        week_start: row.get(0)?,
        seq: row.get(1)?,
        parent_seq: row.get(2)?,
        disruption_id: row.get(3)?,
        churn: row.get(4)?,
        churn_exceeded: row.get(5)?,
        slots_json: row.get(6)?,
        diff_json: row.get(7)?,
        unplaced_json: row.get(8)?,
        committed_at: row.get(9)?,
        disruption_kind: row.get(10)?,
    })
}

impl RawVersionRow {
    fn into_version(self) -> RepositoryResult<RosterVersion> {
        Ok(RosterVersion {
            week_start: self.week_start,
            seq: self.seq,
            parent_seq: self.parent_seq,
            slots: serde_json::from_str(&self.slots_json)?,
            diff: serde_json::from_str(&self.diff_json)?,
            disruption_id: self.disruption_id,
            disruption_kind: self
                .disruption_kind
                .map(|k| serde_json::from_value(serde_json::Value::String(k)))
                .transpose()?,
            churn: self.churn,
            churn_exceeded: self.churn_exceeded,
            unplaced: serde_json::from_str(&self.unplaced_json)?,
            committed_at: self.committed_at,
        })
    }
}

impl RosterVersionStore for SqliteRosterVersionRepository {
    fn append(&self, version: &RosterVersion) -> RepositoryResult<()> {
        let slots_json = serde_json::to_string(&version.slots)?;
        let diff_json = serde_json::to_string(&version.diff)?;
        let unplaced_json = serde_json::to_string(&version.unplaced)?;

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let latest: Option<u32> = tx.query_row(
            "SELECT MAX(seq) FROM roster_version WHERE week_start = ?1",
            params![version.week_start],
            |row| row.get(0),
        )?;
        check_chain(latest, version)?;

        tx.execute(
            r#"INSERT INTO roster_version (
                week_start, seq, parent_seq, disruption_id, churn, churn_exceeded,
                slots_json, diff_json, unplaced_json, committed_at, disruption_kind
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                version.week_start,
                version.seq,
                version.parent_seq,
                version.disruption_id,
                version.churn,
                version.churn_exceeded,
                slots_json,
                diff_json,
                unplaced_json,
                version.committed_at,
                version.disruption_kind.map(|k| k.to_string()),
            ],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::debug!(
            week_start = %version.week_start,
            seq = version.seq,
            slots = version.slots.len(),
            "排班版本已写入"
        );
        Ok(())
    }

    fn latest(&self, week_start: NaiveDate) -> RepositoryResult<Option<RosterVersion>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                &format!("{} WHERE week_start = ?1 ORDER BY seq DESC LIMIT 1", SELECT_COLUMNS),
                params![week_start],
                map_row,
            )
            .optional()?;
        raw.map(RawVersionRow::into_version).transpose()
    }

    fn get(&self, week_start: NaiveDate, seq: u32) -> RepositoryResult<Option<RosterVersion>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                &format!("{} WHERE week_start = ?1 AND seq = ?2", SELECT_COLUMNS),
                params![week_start, seq],
                map_row,
            )
            .optional()?;
        raw.map(RawVersionRow::into_version).transpose()
    }

    fn history(&self, week_start: NaiveDate) -> RepositoryResult<Vec<RosterVersion>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare(&format!("{} WHERE week_start = ?1 ORDER BY seq ASC", SELECT_COLUMNS))?;
        let raws = stmt
            .query_map(params![week_start], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawVersionRow::into_version).collect()
    }

    fn contains_disruption(&self, week_start: NaiveDate, event_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM roster_version WHERE week_start = ?1 AND disruption_id = ?2 LIMIT 1",
                params![week_start, event_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }
}
