// ==========================================
// 飞行训练排班系统 - 约束校验器
// ==========================================
// 职责: 单个候选分配 / 整个排班快照 的硬约束检查
// 检查顺序: 占用排他 → 飞机限制 → 执勤时间 → 配对资质 → 单飞资格 → 气象
// 红线: 纯函数, 不修改输入, 不做 I/O
// 红线: 同一输入的违规列表顺序固定 (首项即"首个违规")
// ==========================================

use crate::config::EngineConfig;
use crate::domain::resource::ResourcePool;
use crate::domain::rule::{Rule, RuleId, RuleSet};
use crate::domain::sortie::{ResourceRef, Slot};
use crate::domain::types::SortieCategory;
use crate::domain::weather::WeatherBoard;
use crate::engine::dispatch::DispatchEvaluator;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// ValidationContext - 校验上下文
// ==========================================
// weather 为 None 时跳过放行一致性检查 (排班器候选检查 / 转模拟机检查)
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    pub pool: &'a ResourcePool,
    pub config: &'a EngineConfig,
    pub rules: &'a RuleSet,
    pub weather: Option<&'a WeatherBoard>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(pool: &'a ResourcePool, config: &'a EngineConfig, rules: &'a RuleSet) -> Self {
        Self {
            pool,
            config,
            rules,
            weather: None,
        }
    }

    pub fn with_weather(mut self, weather: Option<&'a WeatherBoard>) -> Self {
        self.weather = weather;
        self
    }

    pub fn without_weather(&self) -> Self {
        Self {
            weather: None,
            ..*self
        }
    }
}

// ==========================================
// 校验结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "rules", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
    Ok,
    Violated(Vec<RuleId>),
}

impl ValidationOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ValidationOutcome::Ok)
    }

    /// 首个违规规则
    pub fn first(&self) -> Option<RuleId> {
        match self {
            ValidationOutcome::Ok => None,
            ValidationOutcome::Violated(rules) => rules.first().copied(),
        }
    }

    pub fn rules(&self) -> &[RuleId] {
        match self {
            ValidationOutcome::Ok => &[],
            ValidationOutcome::Violated(rules) => rules,
        }
    }
}

/// 整体快照中的单条违规
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotViolation {
    pub slot_id: String,
    pub rule: RuleId,
}

impl fmt::Display for SlotViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slot_id, self.rule)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "violations", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RosterValidation {
    Ok,
    Violated(Vec<SlotViolation>),
}

impl RosterValidation {
    pub fn is_ok(&self) -> bool {
        matches!(self, RosterValidation::Ok)
    }

    pub fn violations(&self) -> &[SlotViolation] {
        match self {
            RosterValidation::Ok => &[],
            RosterValidation::Violated(v) => v,
        }
    }
}

// ==========================================
// ConstraintValidator - 约束校验器
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintValidator;

impl ConstraintValidator {
    pub fn new() -> Self {
        Self
    }

    /// 校验单个时段在给定快照中的可行性
    ///
    /// # 参数
    /// - slot: 待校验时段 (快照中同 slot_id 的时段视为其旧位置, 不参与比较)
    /// - roster: 当前快照
    ///
    /// # 返回
    /// 全部违规规则, 按检查顺序排列
    pub fn validate(
        &self,
        ctx: &ValidationContext<'_>,
        slot: &Slot,
        roster: &[Slot],
    ) -> ValidationOutcome {
        let others: Vec<&Slot> = roster
            .iter()
            .filter(|s| s.slot_id != slot.slot_id)
            .collect();

        let mut violations = Vec::new();
        for rule in ctx.rules.rules() {
            match rule {
                Rule::BookingExclusivity => {
                    self.check_booking(ctx, slot, &others, &mut violations)
                }
                Rule::AircraftLimits {
                    max_sorties_per_day,
                    min_ground_minutes,
                } => self.check_aircraft_limits(
                    ctx,
                    slot,
                    &others,
                    *max_sorties_per_day,
                    *min_ground_minutes,
                    &mut violations,
                ),
                Rule::DutyHours {
                    max_duty_minutes,
                    brief_minutes,
                    debrief_minutes,
                    min_rest_minutes,
                    max_student_flight_minutes,
                } => {
                    self.check_instructor_duty(
                        ctx,
                        slot,
                        &others,
                        *max_duty_minutes,
                        *brief_minutes,
                        *debrief_minutes,
                        *min_rest_minutes,
                        &mut violations,
                    );
                    self.check_student_flight(
                        ctx,
                        slot,
                        &others,
                        *max_student_flight_minutes,
                        &mut violations,
                    );
                }
                Rule::Pairing { currency_days } => {
                    self.check_pairing(ctx, slot, *currency_days, &mut violations)
                }
                Rule::SoloEligibility { endorsement_days } => {
                    self.check_solo(ctx, slot, *endorsement_days, &mut violations)
                }
                Rule::Weather => self.check_weather(ctx, slot, &mut violations),
            }
        }

        let mut seen = Vec::with_capacity(violations.len());
        for id in violations {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }

        if seen.is_empty() {
            ValidationOutcome::Ok
        } else {
            ValidationOutcome::Violated(seen)
        }
    }

    /// 校验整个快照
    ///
    /// 按快照顺序逐个时段校验, 违规以 (slot_id, rule) 列出
    pub fn validate_all(&self, ctx: &ValidationContext<'_>, roster: &[Slot]) -> RosterValidation {
        let violations: Vec<SlotViolation> = roster
            .iter()
            .flat_map(|slot| {
                self.validate(ctx, slot, roster)
                    .rules()
                    .iter()
                    .map(|rule| SlotViolation {
                        slot_id: slot.slot_id.clone(),
                        rule: *rule,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        if violations.is_empty() {
            RosterValidation::Ok
        } else {
            RosterValidation::Violated(violations)
        }
    }

    // ==========================================
    // 占用排他 / 资源存在性 / 资源类型
    // ==========================================
    fn check_booking(
        &self,
        ctx: &ValidationContext<'_>,
        slot: &Slot,
        others: &[&Slot],
        out: &mut Vec<RuleId>,
    ) {
        let pool = ctx.pool;
        let student = pool.student(&slot.student_id);
        let instructor = slot.instructor_id.as_deref().and_then(|id| pool.instructor(id));

        let unknown = student.is_none()
            || (slot.instructor_id.is_some() && instructor.is_none())
            || !pool.has_resource(&slot.resource);
        if unknown {
            out.push(RuleId::UnknownResource);
        }

        let kind_ok = match (&slot.resource, slot.sortie_type.category()) {
            (ResourceRef::Aircraft(_), SortieCategory::Flight) => true,
            (ResourceRef::Simulator(_), SortieCategory::Sim) => true,
            (ResourceRef::Simulator(_), SortieCategory::Flight) => {
                slot.converted_from.is_some() && !slot.sortie_type.is_solo()
            }
            (ResourceRef::Aircraft(_), SortieCategory::Sim) => false,
        };
        if !kind_ok {
            out.push(RuleId::ResourceKindMismatch);
        }

        if let (Some(required), ResourceRef::Aircraft(id)) = (&slot.aircraft_type, &slot.resource) {
            if let Some(aircraft) = pool.aircraft(id) {
                if &aircraft.aircraft_type != required {
                    out.push(RuleId::AircraftTypeMismatch);
                }
            }
        }

        if others
            .iter()
            .any(|o| o.overlaps(slot) && o.shares_resource(slot))
        {
            out.push(RuleId::BookingExclusivity);
        }

        let window = slot.time_window();
        let student_off = student
            .map(|s| s.unavailable.iter().any(|w| w.overlaps(&window)))
            .unwrap_or(false);
        let instructor_off = instructor
            .map(|i| i.unavailable.iter().any(|w| w.overlaps(&window)))
            .unwrap_or(false);
        let simulator = match &slot.resource {
            ResourceRef::Simulator(id) => pool.simulator(id),
            ResourceRef::Aircraft(_) => None,
        };
        let simulator_off = simulator
            .map(|s| s.unavailable.iter().any(|w| w.overlaps(&window)))
            .unwrap_or(false);
        if student_off || instructor_off || simulator_off {
            out.push(RuleId::ResourceUnavailable);
        }

        if let Some(sim) = simulator {
            if !sim.available.contains(&window) {
                out.push(RuleId::SimulatorWindow);
            }
        }
    }

    // ==========================================
    // 飞机架次 / 地面间隔 / 模拟机场次
    // ==========================================
    fn check_aircraft_limits(
        &self,
        ctx: &ValidationContext<'_>,
        slot: &Slot,
        others: &[&Slot],
        max_sorties_per_day: u32,
        min_ground_minutes: i64,
        out: &mut Vec<RuleId>,
    ) {
        let date = slot.date();
        let same_resource_today = others
            .iter()
            .filter(|o| o.resource == slot.resource && o.date() == date)
            .count() as u32;

        match &slot.resource {
            ResourceRef::Aircraft(id) => {
                let Some(aircraft) = ctx.pool.aircraft(id) else {
                    return;
                };

                if !aircraft.is_dispatchable(&slot.time_window()) {
                    out.push(RuleId::AircraftNotAvailable);
                }

                let carried = if date == ctx.pool.today {
                    aircraft.sorties_today
                } else {
                    0
                };
                if same_resource_today + carried + 1 > max_sorties_per_day {
                    out.push(RuleId::AircraftDailySorties);
                }

                let ground = Duration::minutes(min_ground_minutes);
                let too_close = others
                    .iter()
                    .filter(|o| o.resource == slot.resource)
                    .any(|o| {
                        if o.end <= slot.start {
                            slot.start - o.end < ground
                        } else if slot.end <= o.start {
                            o.start - slot.end < ground
                        } else {
                            false
                        }
                    });
                let after_last = aircraft
                    .last_slot_end
                    .map(|t| slot.start < t + ground)
                    .unwrap_or(false);
                if too_close || after_last {
                    out.push(RuleId::AircraftGroundTime);
                }
            }
            ResourceRef::Simulator(id) => {
                let Some(sim) = ctx.pool.simulator(id) else {
                    return;
                };
                if same_resource_today + 1 > sim.max_sessions_per_day {
                    out.push(RuleId::SimulatorDailySessions);
                }
            }
        }
    }

    // ==========================================
    // 教员执勤 (飞行 + 讲评) / 休息间隔
    // ==========================================
    #[allow(clippy::too_many_arguments)]
    fn check_instructor_duty(
        &self,
        ctx: &ValidationContext<'_>,
        slot: &Slot,
        others: &[&Slot],
        max_duty_minutes: i64,
        brief_minutes: i64,
        debrief_minutes: i64,
        min_rest_minutes: i64,
        out: &mut Vec<RuleId>,
    ) {
        let Some(instructor_id) = slot.instructor_id.as_deref() else {
            return;
        };
        let Some(instructor) = ctx.pool.instructor(instructor_id) else {
            return;
        };

        let date = slot.date();
        let brief = Duration::minutes(brief_minutes);
        let debrief = Duration::minutes(debrief_minutes);

        let mine: Vec<&Slot> = others
            .iter()
            .copied()
            .filter(|o| o.instructor_id.as_deref() == Some(instructor_id))
            .chain(std::iter::once(slot))
            .collect();
        let today: Vec<&Slot> = mine.iter().copied().filter(|s| s.date() == date).collect();

        let carried = if date == ctx.pool.today {
            instructor.duty_minutes_today
        } else {
            0
        };
        let duty: i64 = today
            .iter()
            .map(|s| s.duration_minutes() + brief_minutes + debrief_minutes)
            .sum::<i64>()
            + carried;
        if duty > max_duty_minutes {
            out.push(RuleId::InstructorDutyHours);
        }

        // 当日执勤区间 [首个时段开始 - 讲评, 末个时段结束 + 讲评]
        let day_start = today.iter().map(|s| s.start).min().map(|t| t - brief);
        let day_end = today.iter().map(|s| s.end).max().map(|t| t + debrief);
        let (Some(day_start), Some(day_end)) = (day_start, day_end) else {
            return;
        };

        let rest = Duration::minutes(min_rest_minutes);
        let prev_end = mine
            .iter()
            .filter(|s| s.date() < date)
            .map(|s| s.end + debrief)
            .chain(instructor.last_duty_end.filter(|t| t.date() < date))
            .max();
        let next_start = mine
            .iter()
            .filter(|s| s.date() > date)
            .map(|s| s.start - brief)
            .min();

        let short_before = prev_end.map(|p| day_start - p < rest).unwrap_or(false);
        let short_after = next_start.map(|n| n - day_end < rest).unwrap_or(false);
        if short_before || short_after {
            out.push(RuleId::InstructorRest);
        }
    }

    // ==========================================
    // 学员当日飞行时间 (仅真机)
    // ==========================================
    fn check_student_flight(
        &self,
        ctx: &ValidationContext<'_>,
        slot: &Slot,
        others: &[&Slot],
        max_flight_minutes: i64,
        out: &mut Vec<RuleId>,
    ) {
        if !slot.is_flight_time() {
            return;
        }
        let Some(student) = ctx.pool.student(&slot.student_id) else {
            return;
        };

        let date = slot.date();
        let carried = if date == ctx.pool.today {
            student.flight_minutes_today
        } else {
            0
        };
        let flown: i64 = others
            .iter()
            .filter(|o| o.student_id == slot.student_id && o.is_flight_time() && o.date() == date)
            .map(|o| o.duration_minutes())
            .sum::<i64>()
            + slot.duration_minutes()
            + carried;
        if flown > max_flight_minutes {
            out.push(RuleId::StudentDailyFlight);
        }
    }

    // ==========================================
    // 阶段 / 教员配对与资质
    // ==========================================
    fn check_pairing(
        &self,
        ctx: &ValidationContext<'_>,
        slot: &Slot,
        currency_days: i64,
        out: &mut Vec<RuleId>,
    ) {
        if let Some(student) = ctx.pool.student(&slot.student_id) {
            if student.stage < slot.required_stage {
                out.push(RuleId::StageRequirement);
            }
        }

        if slot.sortie_type.is_solo() {
            if slot.instructor_id.is_some() {
                out.push(RuleId::SoloInstructorAssigned);
            }
            return;
        }

        let Some(instructor_id) = slot.instructor_id.as_deref() else {
            out.push(RuleId::InstructorRequired);
            return;
        };
        // 未知教员已在占用检查中报告
        let Some(instructor) = ctx.pool.instructor(instructor_id) else {
            return;
        };

        match slot.effective_category() {
            SortieCategory::Flight => {
                if !instructor.is_qualified_for(slot.sortie_type) {
                    out.push(RuleId::InstructorQualification);
                }
            }
            SortieCategory::Sim => {
                if !instructor.sim_instructor {
                    out.push(RuleId::SimInstructorRequired);
                }
            }
        }

        if !is_current(instructor.currency_date, slot.date(), currency_days) {
            out.push(RuleId::InstructorCurrency);
        }
    }

    // ==========================================
    // 单飞资格 / 签注有效期
    // ==========================================
    fn check_solo(
        &self,
        ctx: &ValidationContext<'_>,
        slot: &Slot,
        endorsement_days: i64,
        out: &mut Vec<RuleId>,
    ) {
        if !slot.sortie_type.is_solo() {
            return;
        }
        let Some(student) = ctx.pool.student(&slot.student_id) else {
            return;
        };
        if !student.solo_eligible {
            out.push(RuleId::SoloEligibility);
        }
        if !is_current(student.solo_endorsed_on, slot.date(), endorsement_days) {
            out.push(RuleId::SoloEndorsement);
        }
    }

    // ==========================================
    // 放行结论与当前气象一致
    // ==========================================
    fn check_weather(&self, ctx: &ValidationContext<'_>, slot: &Slot, out: &mut Vec<RuleId>) {
        let Some(board) = ctx.weather else {
            return;
        };
        if slot.dispatch.is_none() {
            return;
        }
        let evaluator = DispatchEvaluator::new();
        let assessment = evaluator.assess(slot, ctx.pool, board, &ctx.config.minima);
        if !evaluator.is_consistent(slot, &assessment, &ctx.config.sim_fallback_types) {
            out.push(RuleId::DispatchConsistency);
        }
    }
}

/// 签注/资质日期在 `days` 天内有效 (缺失或晚于科目日期视为无效)
fn is_current(endorsed_on: Option<NaiveDate>, on: NaiveDate, days: i64) -> bool {
    endorsed_on
        .map(|d| d <= on && (on - d).num_days() <= days)
        .unwrap_or(false)
}
