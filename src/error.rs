// ==========================================
// 飞行训练排班系统 - 引擎层错误类型
// ==========================================
// 传播策略:
// - 约束违反 / 无法落位 在排班与重排流程中作为数据返回
//   (ValidationOutcome / UnplacedRequest / ReplanOutcome::Rejected)
// - 仅 输入错误 / 扰动不一致 / 存储错误 作为 Err 上抛
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::sortie::UnplacedRequest;
use crate::engine::validator::SlotViolation;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 输入数据格式错误/不完整, 不提交任何内容
    #[error("输入错误: {0}")]
    Input(String),

    /// 排班结果违反硬约束 (初始构建场景)
    #[error("约束违反: {} 项, 首项 {}", .0.len(), .0.first().map(|v| v.to_string()).unwrap_or_default())]
    ConstraintViolation(Vec<SlotViolation>),

    /// 单个请求无可行候选 (直接调用方需要硬失败时使用)
    #[error("请求无法落位: request_id={request_id}, rule={rule}")]
    InfeasibleRequest { request_id: String, rule: String },

    /// 扰动引用未知资源 / 已处理事件
    #[error("扰动不一致: event_id={event_id}, {message}")]
    DisruptionInconsistency { event_id: String, message: String },

    /// 超出计算时限
    #[error("计算超时: {operation} 超过 {budget_ms}ms")]
    TimeoutExceeded { operation: String, budget_ms: u64 },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ImportError> for EngineError {
    fn from(err: ImportError) -> Self {
        EngineError::Input(err.to_string())
    }
}

impl From<UnplacedRequest> for EngineError {
    fn from(u: UnplacedRequest) -> Self {
        EngineError::InfeasibleRequest {
            request_id: u.request.request_id,
            rule: u.reason.to_string(),
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
