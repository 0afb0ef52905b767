// ==========================================
// 飞行训练排班系统 - 引擎层
// ==========================================
// 职责: 约束校验 / 气象放行 / 贪心排班 / 扰动重排
// 红线: Engine 不拼 SQL, 所有结论都携带规则标识
// ==========================================

pub mod churn;
pub mod clock;
pub mod dispatch;
pub mod events;
pub mod impact;
pub mod metrics;
pub mod orchestrator;
pub mod priority;
pub mod scheduler;
pub mod service;
pub mod validator;

// 重导出核心引擎
pub use churn::{ChurnCalculator, ChurnReport};
pub use clock::{Clock, FixedClock, SystemClock};
pub use dispatch::{DispatchEvaluator, WeatherAssessment};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, RosterEvent, RosterEventPublisher,
    RosterEventType,
};
pub use impact::{apply_event, ImpactAssessor};
pub use metrics::{CoverageMetrics, RosterMetrics};
pub use orchestrator::{
    Deadline, RejectReason, ReplanOrchestrator, ReplanOutcome, ReplanState, WeekState,
};
pub use priority::PrioritySorter;
pub use scheduler::{GreedyScheduler, ScheduleOutcome};
pub use service::RosterService;
pub use validator::{
    ConstraintValidator, RosterValidation, SlotViolation, ValidationContext, ValidationOutcome,
};
