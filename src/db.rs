// ==========================================
// 飞行训练排班系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout, 减少并发写入时的偶发 busy 错误
// - 建表幂等 (CREATE TABLE IF NOT EXISTS)
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout (毫秒)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明: foreign_keys / busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化表结构 (幂等)
///
/// # 表
/// - roster_version: 每周线性版本链, (week_start, seq) 唯一
/// - config_scope / config_kv: 引擎配置覆写
/// - schema_version: 结构版本标记
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS roster_version (
            week_start TEXT NOT NULL,
            seq INTEGER NOT NULL,
            parent_seq INTEGER,
            disruption_id TEXT,
            disruption_kind TEXT,
            churn REAL NOT NULL DEFAULT 0,
            churn_exceeded INTEGER NOT NULL DEFAULT 0,
            slots_json TEXT NOT NULL,
            diff_json TEXT NOT NULL,
            unplaced_json TEXT NOT NULL DEFAULT '[]',
            committed_at TEXT NOT NULL,
            PRIMARY KEY (week_start, seq)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_roster_version_disruption
            ON roster_version (week_start, disruption_id)
            WHERE disruption_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT NOT NULL PRIMARY KEY,
            scope_type TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id),
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type) VALUES ('global', 'GLOBAL');
        "#,
    )?;
    ensure_disruption_kind_column(conn)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// v1 → v2: roster_version 增加 disruption_kind 列
fn ensure_disruption_kind_column(conn: &Connection) -> rusqlite::Result<()> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('roster_version') WHERE name = 'disruption_kind'",
        [],
        |row| row.get(0),
    )?;
    if exists == 0 {
        conn.execute_batch("ALTER TABLE roster_version ADD COLUMN disruption_kind TEXT;")?;
    }
    Ok(())
}

/// 读取 schema_version (若表不存在则返回 None)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
