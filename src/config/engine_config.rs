// ==========================================
// 飞行训练排班系统 - 引擎配置
// ==========================================
// 职责: 全部数值约束、气象最低标准、优先级表、变更率目标
// 说明: 所有字段带默认值, 配置文件/config_kv 只需覆写差异项
// ==========================================

use crate::domain::rule::{Rule, RuleSet};
use crate::domain::types::{SortieType, Stage};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// ==========================================
// WeatherMinima - 单行气象最低标准
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherMinima {
    pub ceiling_ft: u32,     // 最低云底高
    pub visibility_sm: f64,  // 最低能见度
    pub wind_kt: u32,        // 最大风速
    pub crosswind_kt: u32,   // 最大侧风
}

/// 阶段区间 [from_stage, to_stage] 适用的带飞最低标准
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMinima {
    pub from_stage: u8,
    pub to_stage: u8,
    pub minima: WeatherMinima,
}

// ==========================================
// MinimaTable - 按 (阶段, 单飞/带飞) 查表
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimaTable {
    pub dual: Vec<StageMinima>,
    pub solo: WeatherMinima,
}

impl MinimaTable {
    /// 查找适用标准; 阶段未覆盖时取最严格一行
    pub fn lookup(&self, stage: Stage, solo: bool) -> WeatherMinima {
        if solo {
            return self.solo;
        }
        self.dual
            .iter()
            .find(|row| (row.from_stage..=row.to_stage).contains(&stage.level()))
            .map(|row| row.minima)
            .unwrap_or_else(|| self.strictest_dual())
    }

    fn strictest_dual(&self) -> WeatherMinima {
        self.dual
            .iter()
            .map(|row| row.minima)
            .max_by_key(|m| m.ceiling_ft)
            .unwrap_or(self.solo)
    }
}

impl Default for MinimaTable {
    fn default() -> Self {
        Self {
            dual: vec![
                StageMinima {
                    from_stage: 1,
                    to_stage: 2,
                    minima: WeatherMinima {
                        ceiling_ft: 2500,
                        visibility_sm: 8.0,
                        wind_kt: 10,
                        crosswind_kt: 8,
                    },
                },
                StageMinima {
                    from_stage: 3,
                    to_stage: 4,
                    minima: WeatherMinima {
                        ceiling_ft: 1500,
                        visibility_sm: 5.0,
                        wind_kt: 15,
                        crosswind_kt: 12,
                    },
                },
            ],
            solo: WeatherMinima {
                ceiling_ft: 3000,
                visibility_sm: 10.0,
                wind_kt: 10,
                crosswind_kt: 8,
            },
        }
    }
}

// ==========================================
// ChurnPolicy - 变更率超标后的提交策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChurnPolicy {
    CommitFlagged, // 仍提交, 标记 churn_exceeded
    FailClosed,    // 拒绝, 保留父版本
}

// ==========================================
// EngineConfig - 引擎配置全集
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // ===== 飞机 =====
    pub aircraft_max_sorties_per_day: u32,
    pub aircraft_min_ground_minutes: i64,

    // ===== 教员执勤 =====
    pub instructor_max_duty_minutes: i64,
    pub brief_minutes: i64,
    pub debrief_minutes: i64,
    pub instructor_min_rest_minutes: i64,
    pub instructor_currency_days: i64,

    // ===== 学员 =====
    pub student_max_flight_minutes: i64,
    pub solo_endorsement_days: i64,

    // ===== 排班器 =====
    pub sortie_priority: BTreeMap<SortieType, u32>, // 数值越小越优先
    pub candidate_step_minutes: i64,
    pub operating_open: NaiveTime,
    pub operating_close: NaiveTime,
    pub max_candidates_per_request: usize,

    // ===== 放行 =====
    pub minima: MinimaTable,
    pub sim_fallback_types: BTreeSet<SortieType>,
    pub dispatch_parallel_chunk: usize,

    // ===== 重排 =====
    pub churn_target: f64,
    pub churn_policy: ChurnPolicy,
    pub replan_timeout_ms: u64,
    pub build_timeout_ms: u64, // 整周初始构建时限
}

impl Default for EngineConfig {
    fn default() -> Self {
        let sortie_priority = [
            (SortieType::ChkPrep, 1),
            (SortieType::Solo, 2),
            (SortieType::Nav, 3),
            (SortieType::Circuits, 4),
            (SortieType::SimProcedures, 5),
        ]
        .into_iter()
        .collect();

        Self {
            aircraft_max_sorties_per_day: 2,
            aircraft_min_ground_minutes: 30,
            instructor_max_duty_minutes: 8 * 60,
            brief_minutes: 30,
            debrief_minutes: 30,
            instructor_min_rest_minutes: 10 * 60,
            instructor_currency_days: 90,
            student_max_flight_minutes: 4 * 60,
            solo_endorsement_days: 90,
            sortie_priority,
            candidate_step_minutes: 30,
            operating_open: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
            operating_close: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default(),
            max_candidates_per_request: 20_000,
            minima: MinimaTable::default(),
            sim_fallback_types: [SortieType::Circuits, SortieType::Nav, SortieType::ChkPrep]
                .into_iter()
                .collect(),
            dispatch_parallel_chunk: 64,
            churn_target: 0.30,
            churn_policy: ChurnPolicy::CommitFlagged,
            replan_timeout_ms: 500,
            build_timeout_ms: 10_000,
        }
    }
}

impl EngineConfig {
    /// 从 JSON 文件加载 (缺失字段取默认值)
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// 参数合法性检查
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.candidate_step_minutes <= 0 {
            anyhow::bail!("candidate_step_minutes 必须为正: {}", self.candidate_step_minutes);
        }
        if self.operating_open >= self.operating_close {
            anyhow::bail!(
                "运行时段无效: {} >= {}",
                self.operating_open,
                self.operating_close
            );
        }
        if !(0.0..=1.0).contains(&self.churn_target) {
            anyhow::bail!("churn_target 超出 [0,1]: {}", self.churn_target);
        }
        if self.dispatch_parallel_chunk == 0 {
            anyhow::bail!("dispatch_parallel_chunk 必须为正");
        }
        Ok(())
    }

    /// 科目优先级 (未配置的科目排在最后)
    pub fn priority_of(&self, sortie_type: SortieType) -> u32 {
        self.sortie_priority
            .get(&sortie_type)
            .copied()
            .unwrap_or(u32::MAX)
    }

    /// 生成有序规则集
    pub fn rule_set(&self) -> RuleSet {
        RuleSet::new(vec![
            Rule::BookingExclusivity,
            Rule::AircraftLimits {
                max_sorties_per_day: self.aircraft_max_sorties_per_day,
                min_ground_minutes: self.aircraft_min_ground_minutes,
            },
            Rule::DutyHours {
                max_duty_minutes: self.instructor_max_duty_minutes,
                brief_minutes: self.brief_minutes,
                debrief_minutes: self.debrief_minutes,
                min_rest_minutes: self.instructor_min_rest_minutes,
                max_student_flight_minutes: self.student_max_flight_minutes,
            },
            Rule::Pairing {
                currency_days: self.instructor_currency_days,
            },
            Rule::SoloEligibility {
                endorsement_days: self.solo_endorsement_days,
            },
            Rule::Weather,
        ])
    }
}
