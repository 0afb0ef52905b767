// ==========================================
// 飞行训练排班系统 - 领域类型定义
// ==========================================
// 依据: 排班约束模型 - 实体与枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与外部接口一致)
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 训练阶段 (Stage)
// ==========================================
// 有序等级 1..=4, 决定适用气象最低标准与可执行科目
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Stage(u8);

impl Stage {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    /// 创建阶段 (超出 1..=4 返回 None)
    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&level).then_some(Self(level))
    }

    pub fn level(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Stage::new(value).ok_or_else(|| format!("训练阶段超出范围: {}", value))
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.0
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STAGE-{}", self.0)
    }
}

// ==========================================
// 科目类别 (Sortie Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortieCategory {
    Flight, // 真机飞行
    Sim,    // 模拟机
}

// ==========================================
// 科目类型 (Sortie Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortieType {
    Circuits,      // 起落航线
    Nav,           // 转场导航
    ChkPrep,       // 考核准备
    Solo,          // 单飞
    SimProcedures, // 模拟机程序
}

impl SortieType {
    pub const ALL: [SortieType; 5] = [
        SortieType::Circuits,
        SortieType::Nav,
        SortieType::ChkPrep,
        SortieType::Solo,
        SortieType::SimProcedures,
    ];

    pub fn category(&self) -> SortieCategory {
        match self {
            SortieType::SimProcedures => SortieCategory::Sim,
            _ => SortieCategory::Flight,
        }
    }

    pub fn is_solo(&self) -> bool {
        *self == SortieType::Solo
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortieType::Circuits => "CIRCUITS",
            SortieType::Nav => "NAV",
            SortieType::ChkPrep => "CHK_PREP",
            SortieType::Solo => "SOLO",
            SortieType::SimProcedures => "SIM_PROCEDURES",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for SortieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 飞机状态 (Aircraft Status)
// ==========================================
// 红线: MAINTENANCE / GROUNDED 飞机不可排
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AircraftStatus {
    Available,   // 可用
    Maintenance, // 维护
    Grounded,    // 停飞
}

impl fmt::Display for AircraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AircraftStatus::Available => write!(f, "AVAILABLE"),
            AircraftStatus::Maintenance => write!(f, "MAINTENANCE"),
            AircraftStatus::Grounded => write!(f, "GROUNDED"),
        }
    }
}

// ==========================================
// 放行结论 (Dispatch Outcome)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchOutcome {
    Go,         // 放行
    NoGo,       // 不放行
    SimConvert, // 转模拟机
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Go => write!(f, "GO"),
            DispatchOutcome::NoGo => write!(f, "NO_GO"),
            DispatchOutcome::SimConvert => write!(f, "SIM_CONVERT"),
        }
    }
}

// ==========================================
// 扰动类型 (Disruption Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisruptionKind {
    Weather,
    Aircraft,
    Instructor,
    Student,
}

impl fmt::Display for DisruptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisruptionKind::Weather => write!(f, "WEATHER"),
            DisruptionKind::Aircraft => write!(f, "AIRCRAFT"),
            DisruptionKind::Instructor => write!(f, "INSTRUCTOR"),
            DisruptionKind::Student => write!(f, "STUDENT"),
        }
    }
}

// ==========================================
// 时间窗口 (Time Window)
// ==========================================
// 半开区间 [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// 整周窗口: week_start 00:00 起 7 天
    pub fn week(week_start: NaiveDate) -> Self {
        let start = week_start.and_hms_opt(0, 0, 0).unwrap_or_default();
        Self {
            start,
            end: start + Duration::days(7),
        }
    }

    /// 整日窗口
    pub fn day(date: NaiveDate) -> Self {
        let start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_instant(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }

    /// 交集 (无交集返回 None)
    pub fn intersect(&self, other: &TimeWindow) -> Option<TimeWindow> {
        let w = TimeWindow {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        };
        w.is_valid().then_some(w)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}
