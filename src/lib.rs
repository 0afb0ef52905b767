// ==========================================
// 飞行训练排班系统 - 核心库
// ==========================================
// 职责: 一周训练排班的约束求解、放行评估与扰动重排
// 技术栈: Rust + SQLite
// 系统定位: 排班引擎 (版本链只追加, 每次变更可追溯)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 版本存储
pub mod repository;

// 引擎层 - 排班/放行/重排
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 引擎参数
pub mod config;

// 数据库基础设施 (连接初始化/PRAGMA 统一)
pub mod db;

// 日志系统
pub mod logging;

// 引擎错误
pub mod error;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    AircraftStatus, DispatchOutcome, DisruptionEvent, DisruptionKind, ResourcePool, RosterDiff,
    RosterVersion, Slot, SortieRequest, SortieType, Stage, TimeWindow, WeatherBoard,
};

// 引擎
pub use engine::{
    Deadline, ReplanOrchestrator, ReplanOutcome, ReplanState, RosterService, WeekState,
};

// 配置
pub use config::{ChurnPolicy, EngineConfig};

// 错误
pub use error::{EngineError, EngineResult};

// API
pub use api::{ApiError, ApiResult, RosterApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "飞行训练排班系统";
