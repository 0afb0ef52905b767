// ==========================================
// 飞行训练排班系统 - API层错误类型
// ==========================================
// 职责: 将引擎/仓储错误转换为对外错误, 并映射退出码
// 退出码:
// - 0 成功 (含 REJECTED, 结果为数据)
// - 2 输入错误
// - 3 约束违反 / 无法落位
// - 4 扰动不一致
// - 5 计算超时
// - 6 存储错误
// - 1 其他
// ==========================================

use crate::engine::validator::SlotViolation;
use crate::error::EngineError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 约束错误
    // ==========================================
    #[error("约束违反: {}", .0.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    ConstraintViolation(Vec<SlotViolation>),

    #[error("请求无法落位: request_id={request_id}, rule={rule}")]
    InfeasibleRequest { request_id: String, rule: String },

    // ==========================================
    // 扰动 / 时限
    // ==========================================
    #[error("扰动不一致: event_id={event_id}, {message}")]
    DisruptionInconsistency { event_id: String, message: String },

    #[error("计算超时: {operation} 超过 {budget_ms}ms")]
    TimeoutExceeded { operation: String, budget_ms: u64 },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("版本冲突: {0}")]
    VersionConflict(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 进程退出码
    pub fn exit_code(&self) -> i32 {
        match self {
            ApiError::InvalidInput(_) | ApiError::ImportError(_) => 2,
            ApiError::ConstraintViolation(_) | ApiError::InfeasibleRequest { .. } => 3,
            ApiError::DisruptionInconsistency { .. } => 4,
            ApiError::TimeoutExceeded { .. } => 5,
            ApiError::VersionConflict(_)
            | ApiError::NotFound(_)
            | ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_) => 6,
            ApiError::Other(_) => 1,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::VersionConflict { message } => ApiError::VersionConflict(message),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg)
            | RepositoryError::SerializationError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Input(msg) => ApiError::InvalidInput(msg),
            EngineError::ConstraintViolation(v) => ApiError::ConstraintViolation(v),
            EngineError::InfeasibleRequest { request_id, rule } => {
                ApiError::InfeasibleRequest { request_id, rule }
            }
            EngineError::DisruptionInconsistency { event_id, message } => {
                ApiError::DisruptionInconsistency { event_id, message }
            }
            EngineError::TimeoutExceeded {
                operation,
                budget_ms,
            } => ApiError::TimeoutExceeded {
                operation,
                budget_ms,
            },
            EngineError::Repository(e) => e.into(),
            EngineError::Other(e) => ApiError::Other(e),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        ApiError::ImportError(err.to_string())
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
