// ==========================================
// 飞行训练排班系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 排班版本的只追加存储, 屏蔽存储细节
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod roster_store;
pub mod roster_version_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use roster_store::{InMemoryRosterStore, RosterVersionStore};
pub use roster_version_repo::SqliteRosterVersionRepository;
