// ==========================================
// 飞行训练排班系统 - 规则领域模型
// ==========================================
// 依据: 排班约束模型 - Rule
// 红线: 引擎只输出规则标识, 规则正文由外部渲染
// ==========================================
// Rule: 封闭的约束类别枚举 (带参数), 由校验器穷举 match
// RuleId: 细粒度引用标识, 稳定的 SCREAMING_SNAKE 编码
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 约束类别 (检查顺序即声明顺序)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleCategory {
    BookingExclusivity,
    AircraftLimits,
    DutyHours,
    Pairing,
    SoloEligibility,
    Weather,
    Scheduling,
}

// ==========================================
// RuleId - 规则引用标识
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleId {
    // ===== 占用排他 =====
    BookingExclusivity,
    ResourceUnavailable,
    UnknownResource,
    ResourceKindMismatch,
    AircraftTypeMismatch,
    SimulatorWindow,

    // ===== 飞机/模拟机限制 =====
    AircraftNotAvailable,
    AircraftDailySorties,
    AircraftGroundTime,
    SimulatorDailySessions,

    // ===== 执勤/飞行时间 =====
    InstructorDutyHours,
    InstructorRest,
    StudentDailyFlight,

    // ===== 配对/资质 =====
    StageRequirement,
    InstructorRequired,
    InstructorQualification,
    InstructorCurrency,
    SimInstructorRequired,
    SoloInstructorAssigned,

    // ===== 单飞资格 =====
    SoloEligibility,
    SoloEndorsement,

    // ===== 气象 =====
    WxCeilingMinima,
    WxVisibilityMinima,
    WxWindLimit,
    WxCrosswindLimit,
    WxThunderstormProximity,
    WxSoloMinima,
    WxObservationUnknown,
    WxSimNoWeather,
    SimFallback,
    NoSimAvailable,
    NoSimFallback,
    DispatchConsistency,

    // ===== 排班器 =====
    NoCandidate,
}

impl RuleId {
    pub fn code(&self) -> &'static str {
        match self {
            RuleId::BookingExclusivity => "BOOKING_EXCLUSIVITY",
            RuleId::ResourceUnavailable => "RESOURCE_UNAVAILABLE",
            RuleId::UnknownResource => "UNKNOWN_RESOURCE",
            RuleId::ResourceKindMismatch => "RESOURCE_KIND_MISMATCH",
            RuleId::AircraftTypeMismatch => "AIRCRAFT_TYPE_MISMATCH",
            RuleId::SimulatorWindow => "SIMULATOR_WINDOW",
            RuleId::AircraftNotAvailable => "AIRCRAFT_NOT_AVAILABLE",
            RuleId::AircraftDailySorties => "AIRCRAFT_DAILY_SORTIES",
            RuleId::AircraftGroundTime => "AIRCRAFT_GROUND_TIME",
            RuleId::SimulatorDailySessions => "SIMULATOR_DAILY_SESSIONS",
            RuleId::InstructorDutyHours => "INSTRUCTOR_DUTY_HOURS",
            RuleId::InstructorRest => "INSTRUCTOR_REST",
            RuleId::StudentDailyFlight => "STUDENT_DAILY_FLIGHT",
            RuleId::StageRequirement => "STAGE_REQUIREMENT",
            RuleId::InstructorRequired => "INSTRUCTOR_REQUIRED",
            RuleId::InstructorQualification => "INSTRUCTOR_QUALIFICATION",
            RuleId::InstructorCurrency => "INSTRUCTOR_CURRENCY",
            RuleId::SimInstructorRequired => "SIM_INSTRUCTOR_REQUIRED",
            RuleId::SoloInstructorAssigned => "SOLO_INSTRUCTOR_ASSIGNED",
            RuleId::SoloEligibility => "SOLO_ELIGIBILITY",
            RuleId::SoloEndorsement => "SOLO_ENDORSEMENT",
            RuleId::WxCeilingMinima => "WX_CEILING_MINIMA",
            RuleId::WxVisibilityMinima => "WX_VISIBILITY_MINIMA",
            RuleId::WxWindLimit => "WX_WIND_LIMIT",
            RuleId::WxCrosswindLimit => "WX_CROSSWIND_LIMIT",
            RuleId::WxThunderstormProximity => "WX_THUNDERSTORM_PROXIMITY",
            RuleId::WxSoloMinima => "WX_SOLO_MINIMA",
            RuleId::WxObservationUnknown => "WX_OBSERVATION_UNKNOWN",
            RuleId::WxSimNoWeather => "WX_SIM_NO_WEATHER",
            RuleId::SimFallback => "SIM_FALLBACK",
            RuleId::NoSimAvailable => "NO_SIM_AVAILABLE",
            RuleId::NoSimFallback => "NO_SIM_FALLBACK",
            RuleId::DispatchConsistency => "DISPATCH_CONSISTENCY",
            RuleId::NoCandidate => "NO_CANDIDATE",
        }
    }

    pub fn category(&self) -> RuleCategory {
        use RuleId::*;
        match self {
            BookingExclusivity | ResourceUnavailable | UnknownResource | ResourceKindMismatch
            | AircraftTypeMismatch | SimulatorWindow => RuleCategory::BookingExclusivity,
            AircraftNotAvailable | AircraftDailySorties | AircraftGroundTime
            | SimulatorDailySessions => RuleCategory::AircraftLimits,
            InstructorDutyHours | InstructorRest | StudentDailyFlight => RuleCategory::DutyHours,
            StageRequirement | InstructorRequired | InstructorQualification
            | InstructorCurrency | SimInstructorRequired | SoloInstructorAssigned => {
                RuleCategory::Pairing
            }
            SoloEligibility | SoloEndorsement => RuleCategory::SoloEligibility,
            WxCeilingMinima | WxVisibilityMinima | WxWindLimit | WxCrosswindLimit
            | WxThunderstormProximity | WxSoloMinima | WxObservationUnknown | WxSimNoWeather
            | SimFallback | NoSimAvailable | NoSimFallback | DispatchConsistency => {
                RuleCategory::Weather
            }
            NoCandidate => RuleCategory::Scheduling,
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ==========================================
// Rule - 约束类别 + 结构化参数
// ==========================================
// 新增约束类别 = 新增枚举分支, 校验器 match 穷举由编译器检查
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rule {
    /// 资源占用排他 + 资源类型/可用窗口
    BookingExclusivity,
    /// 飞机架次/地面间隔 + 模拟机场次
    AircraftLimits {
        max_sorties_per_day: u32,
        min_ground_minutes: i64,
    },
    /// 教员执勤/休息 + 学员日飞行时间
    DutyHours {
        max_duty_minutes: i64,
        brief_minutes: i64,
        debrief_minutes: i64,
        min_rest_minutes: i64,
        max_student_flight_minutes: i64,
    },
    /// 阶段/教员资质/资质有效期
    Pairing { currency_days: i64 },
    /// 单飞资格与签注有效期
    SoloEligibility { endorsement_days: i64 },
    /// 放行结论与气象评估一致
    Weather,
}

impl Rule {
    pub fn category(&self) -> RuleCategory {
        match self {
            Rule::BookingExclusivity => RuleCategory::BookingExclusivity,
            Rule::AircraftLimits { .. } => RuleCategory::AircraftLimits,
            Rule::DutyHours { .. } => RuleCategory::DutyHours,
            Rule::Pairing { .. } => RuleCategory::Pairing,
            Rule::SoloEligibility { .. } => RuleCategory::SoloEligibility,
            Rule::Weather => RuleCategory::Weather,
        }
    }
}

// ==========================================
// RuleSet - 有序规则集
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// 构造规则集, 按类别排序保证固定检查顺序
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(|r| r.category());
        rules.dedup_by_key(|r| r.category());
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
