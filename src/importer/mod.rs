// ==========================================
// 飞行训练排班系统 - 导入层
// ==========================================
// 职责: 外部录入数据 → 内部领域对象
// 支持: JSON 周数据包, CSV 训练请求
// 红线: 引用不完整/格式错误的输入直接拒绝, 不进入引擎
// ==========================================

pub mod bundle;
pub mod error;
pub mod integrity;
pub mod request_csv;

pub use bundle::RosterBundle;
pub use error::{ImportError, ImportResult};
pub use integrity::{IntegrityChecker, IntegrityInput, IntegrityViolation};
pub use request_csv::RequestCsvParser;
