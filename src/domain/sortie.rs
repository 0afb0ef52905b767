// ==========================================
// 飞行训练排班系统 - 科目/排班时段领域模型
// ==========================================
// 依据: 排班约束模型 - SortieRequest / Slot
// 红线: Slot 提交后不可变, 修正通过新版本表达
// ==========================================

use crate::domain::rule::RuleId;
use crate::domain::types::{DispatchOutcome, SortieCategory, SortieType, Stage, TimeWindow};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// SortieRequest - 待排科目请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortieRequest {
    pub request_id: String,            // 请求ID (周内唯一)
    pub student_id: String,            // 学员
    pub sortie_type: SortieType,       // 科目类型
    pub required_stage: Stage,         // 最低训练阶段
    pub window: TimeWindow,            // 允许落位窗口
    pub duration_minutes: i64,         // 时长 (分钟)
    #[serde(default)]
    pub aircraft_type: Option<String>, // 指定机型 (可选)
}

impl SortieRequest {
    /// 请求落位后的时段ID (同一请求重排后保持不变, 便于版本间比对)
    pub fn slot_id(&self) -> String {
        format!("SLOT-{}", self.request_id)
    }
}

// ==========================================
// ResourceRef - 飞机或模拟机引用
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceRef {
    Aircraft(String),
    Simulator(String),
}

impl ResourceRef {
    pub fn id(&self) -> &str {
        match self {
            ResourceRef::Aircraft(id) | ResourceRef::Simulator(id) => id,
        }
    }

    pub fn is_aircraft(&self) -> bool {
        matches!(self, ResourceRef::Aircraft(_))
    }

    pub fn is_simulator(&self) -> bool {
        matches!(self, ResourceRef::Simulator(_))
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Aircraft(id) => write!(f, "AIRCRAFT:{}", id),
            ResourceRef::Simulator(id) => write!(f, "SIMULATOR:{}", id),
        }
    }
}

// ==========================================
// DispatchDecision - 放行结论
// ==========================================
// rules: 参与评估的全部规则 (通过或未通过), 供外部引用渲染
// breaches: 其中未通过的规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchDecision {
    pub outcome: DispatchOutcome,
    pub rules: Vec<RuleId>,
    #[serde(default)]
    pub breaches: Vec<RuleId>,
}

// ==========================================
// Slot - 已落位的排班时段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub slot_id: String,                      // 时段ID
    pub request_id: String,                   // 来源请求
    pub sortie_type: SortieType,              // 科目类型
    pub required_stage: Stage,                // 最低训练阶段
    pub start: NaiveDateTime,                 // 开始
    pub end: NaiveDateTime,                   // 结束
    pub window: TimeWindow,                   // 原请求允许窗口 (重排时复用)
    #[serde(default)]
    pub aircraft_type: Option<String>,        // 原请求指定机型
    pub student_id: String,                   // 学员
    #[serde(default)]
    pub instructor_id: Option<String>,        // 教员 (SOLO 为空)
    pub resource: ResourceRef,                // 飞机或模拟机
    #[serde(default)]
    pub dispatch: Option<DispatchDecision>,   // 放行结论 (评估前为空)
    #[serde(default)]
    pub converted_from: Option<ResourceRef>,  // SIM_CONVERT 前的原飞机
}

impl Slot {
    /// 由请求 + 候选分配生成时段
    pub fn from_request(
        request: &SortieRequest,
        start: NaiveDateTime,
        instructor_id: Option<String>,
        resource: ResourceRef,
    ) -> Self {
        Self {
            slot_id: request.slot_id(),
            request_id: request.request_id.clone(),
            sortie_type: request.sortie_type,
            required_stage: request.required_stage,
            start,
            end: start + Duration::minutes(request.duration_minutes),
            window: request.window,
            aircraft_type: request.aircraft_type.clone(),
            student_id: request.student_id.clone(),
            instructor_id,
            resource,
            dispatch: None,
            converted_from: None,
        }
    }

    /// 还原为请求 (重排时重新提交给排班器)
    pub fn to_request(&self) -> SortieRequest {
        SortieRequest {
            request_id: self.request_id.clone(),
            student_id: self.student_id.clone(),
            sortie_type: self.sortie_type,
            required_stage: self.required_stage,
            window: self.window,
            duration_minutes: (self.end - self.start).num_minutes(),
            aircraft_type: self.aircraft_type.clone(),
        }
    }

    pub fn time_window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// 计入飞行时间 (仅真机)
    pub fn is_flight_time(&self) -> bool {
        self.resource.is_aircraft()
    }

    /// 实际执行形态: 模拟机上的时段 (SIM 科目或 SIM_CONVERT) 视为 SIM
    pub fn effective_category(&self) -> SortieCategory {
        if self.resource.is_simulator() {
            SortieCategory::Sim
        } else {
            SortieCategory::Flight
        }
    }

    pub fn outcome(&self) -> Option<DispatchOutcome> {
        self.dispatch.as_ref().map(|d| d.outcome)
    }

    /// 与另一时段是否使用同一资源 (学员/教员/飞机或模拟机)
    pub fn shares_resource(&self, other: &Slot) -> bool {
        self.student_id == other.student_id
            || self.resource == other.resource
            || matches!(
                (&self.instructor_id, &other.instructor_id),
                (Some(a), Some(b)) if a == b
            )
    }

    /// 分配是否相同 (时间/学员/教员/资源), 不比较放行结论
    pub fn same_assignment(&self, other: &Slot) -> bool {
        self.start == other.start
            && self.end == other.end
            && self.student_id == other.student_id
            && self.instructor_id == other.instructor_id
            && self.resource == other.resource
    }
}

// ==========================================
// UnplacedRequest - 未落位请求 (需人工处理)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnplacedRequest {
    pub request: SortieRequest,
    pub reason: RuleId,            // 首个候选失败的首条规则
    #[serde(default)]
    pub violations: Vec<RuleId>,   // 首个候选的全部违规
}
