// ==========================================
// 飞行训练排班系统 - 资源领域模型
// ==========================================
// 依据: 排班约束模型 - Student / Instructor / Aircraft / Simulator
// 红线: 资源在一个排班周期内只读, 变更通过新快照表达
// ==========================================

use crate::domain::sortie::ResourceRef;
use crate::domain::types::{AircraftStatus, SortieType, Stage, TimeWindow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// Student - 学员
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,                   // 学员ID
    pub stage: Stage,                         // 训练阶段
    #[serde(default)]
    pub solo_eligible: bool,                  // 单飞资格
    #[serde(default)]
    pub solo_endorsed_on: Option<NaiveDate>,  // 单飞签注日期
    #[serde(default)]
    pub flight_minutes_today: i64,            // 当日已飞时间 (分钟)
    #[serde(default)]
    pub unavailable: Vec<TimeWindow>,         // 不可用时段
}

// ==========================================
// Instructor - 教员
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    pub instructor_id: String,                 // 教员ID
    pub qualified_types: BTreeSet<SortieType>, // 可带飞科目
    #[serde(default)]
    pub sim_instructor: bool,                  // 模拟机教员
    #[serde(default)]
    pub currency_date: Option<NaiveDate>,      // 资质有效性签注日期
    #[serde(default)]
    pub duty_minutes_today: i64,               // 当日已执勤 (分钟)
    #[serde(default)]
    pub last_duty_end: Option<NaiveDateTime>,  // 上一执勤日结束时刻
    #[serde(default)]
    pub unavailable: Vec<TimeWindow>,          // 不可用时段
}

impl Instructor {
    pub fn is_qualified_for(&self, sortie_type: SortieType) -> bool {
        self.qualified_types.contains(&sortie_type)
    }
}

// ==========================================
// Aircraft - 飞机
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    pub aircraft_id: String,                  // 飞机ID
    pub aircraft_type: String,                // 机型 (如 C172)
    pub status: AircraftStatus,               // 状态
    #[serde(default)]
    pub sorties_today: u32,                   // 当日已排架次
    #[serde(default)]
    pub last_slot_end: Option<NaiveDateTime>, // 最近架次结束时刻 (地面间隔检查)
    #[serde(default)]
    pub blackouts: Vec<TimeWindow>,           // 停场时段 (扰动产生)
}

impl Aircraft {
    /// 在给定窗口内是否可派 (状态 + 停场时段)
    pub fn is_dispatchable(&self, window: &TimeWindow) -> bool {
        self.status == AircraftStatus::Available
            && !self.blackouts.iter().any(|b| b.overlaps(window))
    }
}

// ==========================================
// Simulator - 模拟机
// ==========================================
fn default_max_sessions() -> u32 {
    4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulator {
    pub simulator_id: String,          // 模拟机ID
    pub available: TimeWindow,         // 可用窗口
    #[serde(default = "default_max_sessions")]
    pub max_sessions_per_day: u32,     // 单日最大训练次数
    #[serde(default)]
    pub unavailable: Vec<TimeWindow>,  // 不可用时段
}

// ==========================================
// ResourcePool - 资源池
// ==========================================
// 用途: 一个排班周期内的全部只读资源输入
// 说明: BTreeMap 保证候选枚举顺序确定 (按ID升序)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub today: NaiveDate, // "当日"计数 (flight/duty/sorties_today) 适用的日期
    pub students: BTreeMap<String, Student>,
    pub instructors: BTreeMap<String, Instructor>,
    pub aircraft: BTreeMap<String, Aircraft>,
    pub simulators: BTreeMap<String, Simulator>,
}

impl ResourcePool {
    pub fn new(
        today: NaiveDate,
        students: Vec<Student>,
        instructors: Vec<Instructor>,
        aircraft: Vec<Aircraft>,
        simulators: Vec<Simulator>,
    ) -> Self {
        Self {
            today,
            students: students
                .into_iter()
                .map(|s| (s.student_id.clone(), s))
                .collect(),
            instructors: instructors
                .into_iter()
                .map(|i| (i.instructor_id.clone(), i))
                .collect(),
            aircraft: aircraft
                .into_iter()
                .map(|a| (a.aircraft_id.clone(), a))
                .collect(),
            simulators: simulators
                .into_iter()
                .map(|s| (s.simulator_id.clone(), s))
                .collect(),
        }
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.get(id)
    }

    pub fn instructor(&self, id: &str) -> Option<&Instructor> {
        self.instructors.get(id)
    }

    pub fn aircraft(&self, id: &str) -> Option<&Aircraft> {
        self.aircraft.get(id)
    }

    pub fn simulator(&self, id: &str) -> Option<&Simulator> {
        self.simulators.get(id)
    }

    /// 资源引用是否存在
    pub fn has_resource(&self, resource: &ResourceRef) -> bool {
        match resource {
            ResourceRef::Aircraft(id) => self.aircraft.contains_key(id),
            ResourceRef::Simulator(id) => self.simulators.contains_key(id),
        }
    }

    /// 任意类型资源ID是否存在 (扰动一致性检查)
    pub fn knows_id(&self, id: &str) -> bool {
        self.students.contains_key(id)
            || self.instructors.contains_key(id)
            || self.aircraft.contains_key(id)
            || self.simulators.contains_key(id)
    }
}
