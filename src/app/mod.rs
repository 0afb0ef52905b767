// ==========================================
// 飞行训练排班系统 - 应用层
// ==========================================
// 职责: 组件装配 (数据库 → 配置 → 仓储 → 编排器 → API)
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
