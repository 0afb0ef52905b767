// ==========================================
// 飞行训练排班系统 - 应用状态
// ==========================================
// 职责: 组装共享连接、配置、版本仓储、编排器与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::error::{ApiError, ApiResult};
use crate::api::RosterApi;
use crate::config::config_manager::ConfigManager;
use crate::config::engine_config::EngineConfig;
use crate::db::open_sqlite_connection;
use crate::engine::clock::Clock;
use crate::engine::events::RosterEventPublisher;
use crate::engine::orchestrator::ReplanOrchestrator;
use crate::engine::service::RosterService;
use crate::repository::SqliteRosterVersionRepository;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "FLIGHT_ROSTER_DB_PATH";

/// 应用状态
///
/// 所有组件共用同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 生效的引擎配置 (默认值 + config_kv 覆写)
    pub engine_config: EngineConfig,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 排班版本仓储
    pub roster_store: Arc<SqliteRosterVersionRepository>,

    /// 排班API
    pub roster_api: Arc<RosterApi>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 成功创建
    /// - Err(ApiError): 打开数据库或加载配置失败
    pub fn new(db_path: String) -> ApiResult<Self> {
        Self::build(db_path, None, None)
    }

    /// 注入时钟/事件发布器 (测试与嵌入场景)
    pub fn with_components(
        db_path: String,
        clock: Option<Arc<dyn Clock>>,
        publisher: Option<Arc<dyn RosterEventPublisher>>,
    ) -> ApiResult<Self> {
        Self::build(db_path, clock, publisher)
    }

    fn build(
        db_path: String,
        clock: Option<Arc<dyn Clock>>,
        publisher: Option<Arc<dyn RosterEventPublisher>>,
    ) -> ApiResult<Self> {
        tracing::info!("初始化AppState, 数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("打开数据库失败: {}", e)))?;
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone())?);
        let engine_config = config_manager.load_engine_config()?;
        tracing::debug!(config = ?engine_config, "引擎配置已加载");

        let roster_store = Arc::new(SqliteRosterVersionRepository::new(conn)?);

        let mut orchestrator = ReplanOrchestrator::new(roster_store.clone(), engine_config.clone());
        if let Some(clock) = clock {
            orchestrator = orchestrator.with_clock(clock);
        }
        if let Some(publisher) = publisher {
            orchestrator = orchestrator.with_publisher(publisher);
        }

        let service = Arc::new(RosterService::new(orchestrator));
        let roster_api = Arc::new(RosterApi::new(service));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            engine_config,
            config_manager,
            roster_store,
            roster_api,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 FLIGHT_ROSTER_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./flight_roster.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录
        #[cfg(debug_assertions)]
        let dir = data_dir.join("flight-roster-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("flight-roster");

        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("flight_roster.db");
        }
    }

    path.to_string_lossy().to_string()
}
