// ==========================================
// 飞行训练排班系统 - 输入完整性校验
// ==========================================
// 职责: 在进入引擎前检查录入数据
// - 主键唯一 (各实体内)
// - 引用完整 (请求 → 学员)
// - 时间窗口合法, 时长可容纳于窗口
// - 排班周从周一开始
// 输出: 违规列表 (全部收集, 不在首项处中断)
// ==========================================

use crate::domain::resource::{Aircraft, Instructor, Simulator, Student};
use crate::domain::sortie::SortieRequest;
use crate::domain::types::TimeWindow;
use crate::domain::weather::WeatherBoard;
use crate::importer::error::{ImportError, ImportResult};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// 单条完整性违规
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityViolation {
    pub entity: String,  // 实体类型
    pub id: String,      // 实体ID (缺失时为空)
    pub field: String,   // 字段
    pub message: String, // 说明
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}].{}: {}", self.entity, self.id, self.field, self.message)
    }
}

/// 待校验的输入视图
pub struct IntegrityInput<'a> {
    pub week_start: NaiveDate,
    pub students: &'a [Student],
    pub instructors: &'a [Instructor],
    pub aircraft: &'a [Aircraft],
    pub simulators: &'a [Simulator],
    pub requests: &'a [SortieRequest],
    pub weather: Option<&'a WeatherBoard>,
}

pub struct IntegrityChecker;

impl IntegrityChecker {
    pub fn new() -> Self {
        Self
    }

    /// 收集全部违规
    pub fn check(&self, input: &IntegrityInput<'_>) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();

        if input.week_start.weekday() != Weekday::Mon {
            violations.push(violation(
                "week",
                &input.week_start.to_string(),
                "week_start",
                "排班周必须从周一开始",
            ));
        }

        check_unique(
            "student",
            input.students.iter().map(|s| s.student_id.as_str()),
            &mut violations,
        );
        check_unique(
            "instructor",
            input.instructors.iter().map(|i| i.instructor_id.as_str()),
            &mut violations,
        );
        check_unique(
            "aircraft",
            input.aircraft.iter().map(|a| a.aircraft_id.as_str()),
            &mut violations,
        );
        check_unique(
            "simulator",
            input.simulators.iter().map(|s| s.simulator_id.as_str()),
            &mut violations,
        );
        check_unique(
            "request",
            input.requests.iter().map(|r| r.request_id.as_str()),
            &mut violations,
        );

        for s in input.students {
            check_windows("student", &s.student_id, "unavailable", &s.unavailable, &mut violations);
        }
        for i in input.instructors {
            check_windows("instructor", &i.instructor_id, "unavailable", &i.unavailable, &mut violations);
            if i.qualified_types.is_empty() && !i.sim_instructor {
                violations.push(violation(
                    "instructor",
                    &i.instructor_id,
                    "qualified_types",
                    "无任何带飞资质",
                ));
            }
        }
        for a in input.aircraft {
            if a.aircraft_type.trim().is_empty() {
                violations.push(violation("aircraft", &a.aircraft_id, "aircraft_type", "机型为空"));
            }
            check_windows("aircraft", &a.aircraft_id, "blackouts", &a.blackouts, &mut violations);
        }
        for s in input.simulators {
            check_windows(
                "simulator",
                &s.simulator_id,
                "available",
                std::slice::from_ref(&s.available),
                &mut violations,
            );
            check_windows("simulator", &s.simulator_id, "unavailable", &s.unavailable, &mut violations);
        }

        let student_ids: HashSet<&str> =
            input.students.iter().map(|s| s.student_id.as_str()).collect();
        for r in input.requests {
            if !student_ids.contains(r.student_id.as_str()) {
                violations.push(violation(
                    "request",
                    &r.request_id,
                    "student_id",
                    &format!("引用未知学员 {}", r.student_id),
                ));
            }
            if !r.window.is_valid() {
                violations.push(violation("request", &r.request_id, "window", "窗口开始不早于结束"));
            } else if r.duration_minutes <= 0 || r.duration_minutes > r.window.duration_minutes() {
                violations.push(violation(
                    "request",
                    &r.request_id,
                    "duration_minutes",
                    &format!("时长 {} 无法容纳于窗口", r.duration_minutes),
                ));
            }
        }

        if let Some(board) = input.weather {
            for (idx, obs) in board.observations.iter().enumerate() {
                if !obs.window.is_valid() {
                    violations.push(violation(
                        "weather",
                        &format!("{}#{}", board.airfield, idx),
                        "window",
                        "观测窗口开始不早于结束",
                    ));
                }
            }
        }

        violations
    }

    /// 存在违规即返回错误
    pub fn ensure(&self, input: &IntegrityInput<'_>) -> ImportResult<()> {
        let violations = self.check(input);
        match violations.first() {
            None => Ok(()),
            Some(first) => {
                for v in &violations {
                    tracing::warn!(violation = %v, "输入完整性违规");
                }
                Err(ImportError::IntegrityError {
                    count: violations.len(),
                    first: first.to_string(),
                })
            }
        }
    }
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn violation(entity: &str, id: &str, field: &str, message: &str) -> IntegrityViolation {
    IntegrityViolation {
        entity: entity.to_string(),
        id: id.to_string(),
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn check_unique<'a>(
    entity: &str,
    ids: impl Iterator<Item = &'a str>,
    violations: &mut Vec<IntegrityViolation>,
) {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            violations.push(violation(entity, "", "id", "主键缺失"));
            continue;
        }
        if !seen.insert(id) {
            violations.push(violation(entity, id, "id", "主键重复"));
        }
    }
}

fn check_windows(
    entity: &str,
    id: &str,
    field: &str,
    windows: &[TimeWindow],
    violations: &mut Vec<IntegrityViolation>,
) {
    if windows.iter().any(|w| !w.is_valid()) {
        violations.push(violation(entity, id, field, "时间窗口开始不早于结束"));
    }
}
