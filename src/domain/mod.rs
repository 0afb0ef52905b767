// ==========================================
// 飞行训练排班系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、规则标识
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod disruption;
pub mod resource;
pub mod roster;
pub mod rule;
pub mod sortie;
pub mod types;
pub mod weather;

// 重导出核心类型
pub use disruption::{DisruptionEvent, DisruptionState};
pub use resource::{Aircraft, Instructor, ResourcePool, Simulator, Student};
pub use roster::{RosterDiff, RosterVersion};
pub use rule::{Rule, RuleCategory, RuleId, RuleSet};
pub use sortie::{DispatchDecision, ResourceRef, Slot, SortieRequest, UnplacedRequest};
pub use types::{
    AircraftStatus, DispatchOutcome, DisruptionKind, SortieCategory, SortieType, Stage,
    TimeWindow,
};
pub use weather::{WeatherBoard, WeatherObservation};
