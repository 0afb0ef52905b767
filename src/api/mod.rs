// ==========================================
// 飞行训练排班系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供 CLI 与嵌入调用方使用
// ==========================================

pub mod error;
pub mod roster_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use roster_api::{BundleRunReport, ReplanSummary, RosterApi, RosterSummary};
