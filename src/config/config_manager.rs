// ==========================================
// 飞行训练排班系统 - 配置管理器
// ==========================================
// 职责: 引擎配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 规则: 键名 = EngineConfig 字段名, 值为 JSON 文本
//       (裸字符串值也接受, 如 churn_policy = FAIL_CLOSED)
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明: 对传入连接再次应用统一 PRAGMA 与建表 (幂等)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值 (scope_id='global')
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global 配置 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(config_key = key, "配置已更新");
        Ok(())
    }

    /// 获取所有 global 配置的快照 (JSON 格式)
    ///
    /// # 用途
    /// - 运行记录中附带配置快照, 便于复现排班结果
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖现有的 global 配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> RepositoryResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut count = 0;
        for (key, value) in &config_map {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    /// 加载引擎配置: 默认值 + config_kv 覆写
    ///
    /// 单个键格式错误时告警并保留默认值, 不影响其他键
    pub fn load_engine_config(&self) -> RepositoryResult<EngineConfig> {
        let mut merged = serde_json::to_value(EngineConfig::default())?;

        for key in config_keys::ALL {
            let raw = match self.get_global_config_value(key)? {
                Some(v) => v,
                None => continue,
            };

            let parsed: Value =
                serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw.clone()));

            let mut candidate = merged.clone();
            if let Some(obj) = candidate.as_object_mut() {
                obj.insert(key.to_string(), parsed);
            }

            match serde_json::from_value::<EngineConfig>(candidate.clone()) {
                Ok(_) => merged = candidate,
                Err(e) => {
                    tracing::warn!(
                        config_key = key,
                        raw_value = %raw,
                        error = %e,
                        "配置格式错误，使用默认值"
                    );
                }
            }
        }

        let config: EngineConfig = serde_json::from_value(merged)?;
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "配置校验失败，回退到默认配置");
            return Ok(EngineConfig::default());
        }
        Ok(config)
    }
}

// ==========================================
// 配置键常量 (与 EngineConfig 字段一一对应)
// ==========================================
pub mod config_keys {
    // 飞机
    pub const AIRCRAFT_MAX_SORTIES_PER_DAY: &str = "aircraft_max_sorties_per_day";
    pub const AIRCRAFT_MIN_GROUND_MINUTES: &str = "aircraft_min_ground_minutes";

    // 教员执勤
    pub const INSTRUCTOR_MAX_DUTY_MINUTES: &str = "instructor_max_duty_minutes";
    pub const BRIEF_MINUTES: &str = "brief_minutes";
    pub const DEBRIEF_MINUTES: &str = "debrief_minutes";
    pub const INSTRUCTOR_MIN_REST_MINUTES: &str = "instructor_min_rest_minutes";
    pub const INSTRUCTOR_CURRENCY_DAYS: &str = "instructor_currency_days";

    // 学员
    pub const STUDENT_MAX_FLIGHT_MINUTES: &str = "student_max_flight_minutes";
    pub const SOLO_ENDORSEMENT_DAYS: &str = "solo_endorsement_days";

    // 排班器
    pub const SORTIE_PRIORITY: &str = "sortie_priority"; // JSON 对象
    pub const CANDIDATE_STEP_MINUTES: &str = "candidate_step_minutes";
    pub const OPERATING_OPEN: &str = "operating_open";
    pub const OPERATING_CLOSE: &str = "operating_close";
    pub const MAX_CANDIDATES_PER_REQUEST: &str = "max_candidates_per_request";

    // 放行
    pub const MINIMA: &str = "minima"; // JSON 对象
    pub const SIM_FALLBACK_TYPES: &str = "sim_fallback_types"; // JSON 数组
    pub const DISPATCH_PARALLEL_CHUNK: &str = "dispatch_parallel_chunk";

    // 重排
    pub const CHURN_TARGET: &str = "churn_target";
    pub const CHURN_POLICY: &str = "churn_policy";
    pub const REPLAN_TIMEOUT_MS: &str = "replan_timeout_ms";
    pub const BUILD_TIMEOUT_MS: &str = "build_timeout_ms";

    pub const ALL: [&str; 21] = [
        AIRCRAFT_MAX_SORTIES_PER_DAY,
        AIRCRAFT_MIN_GROUND_MINUTES,
        INSTRUCTOR_MAX_DUTY_MINUTES,
        BRIEF_MINUTES,
        DEBRIEF_MINUTES,
        INSTRUCTOR_MIN_REST_MINUTES,
        INSTRUCTOR_CURRENCY_DAYS,
        STUDENT_MAX_FLIGHT_MINUTES,
        SOLO_ENDORSEMENT_DAYS,
        SORTIE_PRIORITY,
        CANDIDATE_STEP_MINUTES,
        OPERATING_OPEN,
        OPERATING_CLOSE,
        MAX_CANDIDATES_PER_REQUEST,
        MINIMA,
        SIM_FALLBACK_TYPES,
        DISPATCH_PARALLEL_CHUNK,
        CHURN_TARGET,
        CHURN_POLICY,
        REPLAN_TIMEOUT_MS,
        BUILD_TIMEOUT_MS,
    ];
}
