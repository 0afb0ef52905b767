// ==========================================
// 飞行训练排班系统 - 气象放行评估
// ==========================================
// 职责: 时段 + 气象观测 → GO / NO_GO / SIM_CONVERT
// 分两步:
// - assess: 纯评估 (只读快照, 可并行)
// - resolve: 结论落定 (查找空闲模拟机, 需按序在最新快照上执行)
// 规则:
// - 最低标准按 (学员阶段, 单飞/带飞) 查表, 边界值视为通过
// - SIM 科目总是 GO
// - 无观测 = 未知 → 按不满足处理
// - 每个结论都携带所有参与评估的规则标识
// ==========================================

use crate::config::MinimaTable;
use crate::domain::resource::ResourcePool;
use crate::domain::rule::RuleId;
use crate::domain::sortie::{DispatchDecision, ResourceRef, Slot};
use crate::domain::types::{DispatchOutcome, SortieCategory, SortieType, Stage};
use crate::domain::weather::{WeatherBoard, WeatherObservation};
use crate::engine::validator::{ConstraintValidator, ValidationContext};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// WeatherAssessment - 纯气象评估结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherAssessment {
    pub rules: Vec<RuleId>,    // 参与评估的规则
    pub breaches: Vec<RuleId>, // 未满足的规则
}

impl WeatherAssessment {
    pub fn is_clear(&self) -> bool {
        self.breaches.is_empty()
    }

    fn sim_no_weather() -> Self {
        Self {
            rules: vec![RuleId::WxSimNoWeather],
            breaches: Vec::new(),
        }
    }
}

// ==========================================
// DispatchEvaluator - 放行评估器
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchEvaluator {
    validator: ConstraintValidator,
}

impl DispatchEvaluator {
    pub fn new() -> Self {
        Self {
            validator: ConstraintValidator::new(),
        }
    }

    /// 单条观测对单个科目的评估
    ///
    /// # 参数
    /// - sortie_type: 科目类型 (决定单飞/带飞标准)
    /// - stage: 学员阶段
    /// - observation: 观测, None 表示未知
    pub fn assess_observation(
        &self,
        sortie_type: SortieType,
        stage: Stage,
        observation: Option<&WeatherObservation>,
        minima: &MinimaTable,
    ) -> WeatherAssessment {
        if sortie_type.category() == SortieCategory::Sim {
            return WeatherAssessment::sim_no_weather();
        }

        let Some(obs) = observation else {
            return WeatherAssessment {
                rules: vec![RuleId::WxObservationUnknown],
                breaches: vec![RuleId::WxObservationUnknown],
            };
        };

        let solo = sortie_type.is_solo();
        let limits = minima.lookup(stage, solo);

        let mut rules = vec![
            RuleId::WxCeilingMinima,
            RuleId::WxVisibilityMinima,
            RuleId::WxWindLimit,
            RuleId::WxCrosswindLimit,
            RuleId::WxThunderstormProximity,
        ];
        if solo {
            rules.push(RuleId::WxSoloMinima);
        }

        let mut breaches = Vec::new();
        // 无云幂 (None) 视为满足云底高要求
        if obs.ceiling_ft.map(|c| c < limits.ceiling_ft).unwrap_or(false) {
            breaches.push(RuleId::WxCeilingMinima);
        }
        if obs.visibility_sm < limits.visibility_sm {
            breaches.push(RuleId::WxVisibilityMinima);
        }
        if obs.wind_kt > limits.wind_kt {
            breaches.push(RuleId::WxWindLimit);
        }
        if obs.crosswind_kt > limits.crosswind_kt {
            breaches.push(RuleId::WxCrosswindLimit);
        }
        if obs.thunderstorm_within_10nm {
            breaches.push(RuleId::WxThunderstormProximity);
        }
        if solo && !breaches.is_empty() {
            breaches.push(RuleId::WxSoloMinima);
        }

        WeatherAssessment { rules, breaches }
    }

    /// 时段的纯气象评估
    ///
    /// 时段内观测可能分段变化: 在时段开始及每个观测窗口边界处取样,
    /// 任一取样不满足即为不满足
    pub fn assess(
        &self,
        slot: &Slot,
        pool: &ResourcePool,
        board: &WeatherBoard,
        minima: &MinimaTable,
    ) -> WeatherAssessment {
        if slot.sortie_type.category() == SortieCategory::Sim {
            return WeatherAssessment::sim_no_weather();
        }

        let stage = pool
            .student(&slot.student_id)
            .map(|s| s.stage)
            .unwrap_or(slot.required_stage);

        let mut instants = vec![slot.start];
        for obs in &board.observations {
            for t in [obs.window.start, obs.window.end] {
                if slot.start < t && t < slot.end {
                    instants.push(t);
                }
            }
        }
        instants.sort();
        instants.dedup();

        let mut rules = BTreeSet::new();
        let mut breaches = BTreeSet::new();
        for t in instants {
            let part =
                self.assess_observation(slot.sortie_type, stage, board.observation_at(t), minima);
            rules.extend(part.rules);
            breaches.extend(part.breaches);
        }

        WeatherAssessment {
            rules: rules.into_iter().collect(),
            breaches: breaches.into_iter().collect(),
        }
    }

    /// 批量纯评估 (按 slot_id 索引)
    pub fn assess_all(
        &self,
        slots: &[Slot],
        pool: &ResourcePool,
        board: &WeatherBoard,
        minima: &MinimaTable,
    ) -> BTreeMap<String, WeatherAssessment> {
        slots
            .iter()
            .map(|s| (s.slot_id.clone(), self.assess(s, pool, board, minima)))
            .collect()
    }

    /// 落定放行结论
    ///
    /// # 参数
    /// - ctx: 校验上下文 (查找模拟机时不含气象检查)
    /// - slot: 待评估时段
    /// - assessment: 该时段的纯评估结果
    /// - roster: 当前快照 (用于判断模拟机/教员是否空闲)
    ///
    /// # 返回
    /// 带放行结论的时段; SIM_CONVERT 时资源与教员已替换
    pub fn resolve(
        &self,
        ctx: &ValidationContext<'_>,
        slot: &Slot,
        assessment: &WeatherAssessment,
        roster: &[Slot],
    ) -> Slot {
        if slot.sortie_type.category() == SortieCategory::Sim {
            return with_decision(slot.clone(), DispatchOutcome::Go, assessment, &[]);
        }

        // 已转模拟机: 天气转好时尝试恢复原飞机, 否则保持
        if let Some(original) = &slot.converted_from {
            if assessment.is_clear() {
                if let Some(restored) = self.try_restore(ctx, slot, original, roster) {
                    return with_decision(restored, DispatchOutcome::Go, assessment, &[]);
                }
            }
            return with_decision(
                slot.clone(),
                DispatchOutcome::SimConvert,
                assessment,
                &[RuleId::SimFallback],
            );
        }

        if assessment.is_clear() {
            return with_decision(slot.clone(), DispatchOutcome::Go, assessment, &[]);
        }

        let has_fallback = !slot.sortie_type.is_solo()
            && ctx.config.sim_fallback_types.contains(&slot.sortie_type);
        if !has_fallback {
            return with_decision(
                slot.clone(),
                DispatchOutcome::NoGo,
                assessment,
                &[RuleId::NoSimFallback],
            );
        }

        match self.find_simulator(ctx, slot, roster) {
            Some(converted) => with_decision(
                converted,
                DispatchOutcome::SimConvert,
                assessment,
                &[RuleId::SimFallback],
            ),
            None => with_decision(
                slot.clone(),
                DispatchOutcome::NoGo,
                assessment,
                &[RuleId::NoSimAvailable],
            ),
        }
    }

    /// assess + resolve
    pub fn evaluate(
        &self,
        ctx: &ValidationContext<'_>,
        board: &WeatherBoard,
        slot: &Slot,
        roster: &[Slot],
    ) -> Slot {
        let assessment = self.assess(slot, ctx.pool, board, &ctx.config.minima);
        self.resolve(ctx, slot, &assessment, roster)
    }

    /// 放行结论与评估是否一致
    pub fn is_consistent(
        &self,
        slot: &Slot,
        assessment: &WeatherAssessment,
        fallback_types: &BTreeSet<SortieType>,
    ) -> bool {
        match (slot.outcome(), &slot.resource) {
            (None, _) => true,
            (Some(DispatchOutcome::Go), ResourceRef::Simulator(_)) => {
                slot.sortie_type.category() == SortieCategory::Sim && slot.converted_from.is_none()
            }
            (Some(DispatchOutcome::SimConvert), ResourceRef::Simulator(_)) => {
                slot.sortie_type.category() == SortieCategory::Flight
                    && slot.converted_from.is_some()
                    && fallback_types.contains(&slot.sortie_type)
            }
            (Some(DispatchOutcome::Go), ResourceRef::Aircraft(_)) => assessment.is_clear(),
            (Some(DispatchOutcome::NoGo), ResourceRef::Aircraft(_)) => !assessment.is_clear(),
            _ => false,
        }
    }

    /// 查找同一时间窗口内空闲的模拟机 + 模拟机教员
    ///
    /// 顺序: 模拟机按ID; 教员优先原教员, 其余按ID
    fn find_simulator(
        &self,
        ctx: &ValidationContext<'_>,
        slot: &Slot,
        roster: &[Slot],
    ) -> Option<Slot> {
        let plain = ctx.without_weather();
        let current = slot
            .instructor_id
            .as_deref()
            .and_then(|id| ctx.pool.instructor(id))
            .filter(|i| i.sim_instructor)
            .map(|i| i.instructor_id.clone());

        let instructors: Vec<String> = current
            .iter()
            .cloned()
            .chain(
                ctx.pool
                    .instructors
                    .values()
                    .filter(|i| i.sim_instructor && Some(&i.instructor_id) != current.as_ref())
                    .map(|i| i.instructor_id.clone()),
            )
            .collect();

        for sim_id in ctx.pool.simulators.keys() {
            for instructor_id in &instructors {
                let mut candidate = slot.clone();
                candidate.resource = ResourceRef::Simulator(sim_id.clone());
                candidate.instructor_id = Some(instructor_id.clone());
                candidate.converted_from = Some(slot.resource.clone());
                candidate.dispatch = None;

                if self.validator.validate(&plain, &candidate, roster).is_ok() {
                    tracing::debug!(
                        slot_id = %slot.slot_id,
                        simulator_id = %sim_id,
                        instructor_id = %instructor_id,
                        "转模拟机候选可行"
                    );
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// 天气转好后恢复原飞机 (教员优先原教员, 其余按ID)
    fn try_restore(
        &self,
        ctx: &ValidationContext<'_>,
        slot: &Slot,
        original: &ResourceRef,
        roster: &[Slot],
    ) -> Option<Slot> {
        let plain = ctx.without_weather();
        let current = slot.instructor_id.clone();
        let instructors: Vec<String> = current
            .iter()
            .cloned()
            .chain(
                ctx.pool
                    .instructors
                    .values()
                    .filter(|i| Some(&i.instructor_id) != current.as_ref())
                    .map(|i| i.instructor_id.clone()),
            )
            .filter(|id| {
                ctx.pool
                    .instructor(id)
                    .map(|i| i.is_qualified_for(slot.sortie_type))
                    .unwrap_or(false)
            })
            .collect();

        instructors.into_iter().find_map(|instructor_id| {
            let mut candidate = slot.clone();
            candidate.resource = original.clone();
            candidate.instructor_id = Some(instructor_id);
            candidate.converted_from = None;
            candidate.dispatch = None;
            self.validator
                .validate(&plain, &candidate, roster)
                .is_ok()
                .then_some(candidate)
        })
    }
}

fn with_decision(
    mut slot: Slot,
    outcome: DispatchOutcome,
    assessment: &WeatherAssessment,
    extra: &[RuleId],
) -> Slot {
    let mut rules = assessment.rules.clone();
    rules.extend_from_slice(extra);
    slot.dispatch = Some(DispatchDecision {
        outcome,
        rules,
        breaches: assessment.breaches.clone(),
    });
    slot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::resource::{Aircraft, Instructor, Simulator, Student};
    use crate::domain::sortie::SortieRequest;
    use crate::domain::types::{AircraftStatus, TimeWindow};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32) -> NaiveDateTime {
        day().and_hms_opt(h, 0, 0).unwrap()
    }

    fn obs(ceiling: u32, vis: f64, wind: u32, xwind: u32) -> WeatherObservation {
        WeatherObservation {
            window: TimeWindow::day(day()),
            ceiling_ft: Some(ceiling),
            visibility_sm: vis,
            wind_kt: wind,
            wind_direction_deg: Some(270),
            crosswind_kt: xwind,
            thunderstorm_within_10nm: false,
        }
    }

    fn pool(with_sim_instructor: bool) -> ResourcePool {
        let student = Student {
            student_id: "S1".to_string(),
            stage: Stage::new(1).unwrap(),
            solo_eligible: false,
            solo_endorsed_on: None,
            flight_minutes_today: 0,
            unavailable: vec![],
        };
        let instructor = |id: &str, sim: bool| Instructor {
            instructor_id: id.to_string(),
            qualified_types: [SortieType::Circuits].into_iter().collect(),
            sim_instructor: sim,
            currency_date: Some(day() - Duration::days(5)),
            duty_minutes_today: 0,
            last_duty_end: None,
            unavailable: vec![],
        };
        let mut instructors = vec![instructor("I1", false)];
        if with_sim_instructor {
            instructors.push(instructor("I2", true));
        }
        ResourcePool::new(
            day(),
            vec![student],
            instructors,
            vec![Aircraft {
                aircraft_id: "A1".to_string(),
                aircraft_type: "C172".to_string(),
                status: AircraftStatus::Available,
                sorties_today: 0,
                last_slot_end: None,
                blackouts: vec![],
            }],
            vec![Simulator {
                simulator_id: "SIM1".to_string(),
                available: TimeWindow::week(day()),
                max_sessions_per_day: 4,
                unavailable: vec![],
            }],
        )
    }

    fn circuits() -> Slot {
        let request = SortieRequest {
            request_id: "R1".to_string(),
            student_id: "S1".to_string(),
            sortie_type: SortieType::Circuits,
            required_stage: Stage::new(1).unwrap(),
            window: TimeWindow::day(day()),
            duration_minutes: 60,
            aircraft_type: None,
        };
        Slot::from_request(
            &request,
            at(9),
            Some("I1".to_string()),
            ResourceRef::Aircraft("A1".to_string()),
        )
    }

    #[test]
    fn test_boundary_values_pass() {
        let e = DispatchEvaluator::new();
        let minima = MinimaTable::default();
        let stage1 = Stage::new(1).unwrap();
        let a = e.assess_observation(SortieType::Circuits, stage1, Some(&obs(2500, 8.0, 10, 8)), &minima);
        assert!(a.is_clear());
        assert_eq!(a.rules.len(), 5);

        let b = e.assess_observation(SortieType::Circuits, stage1, Some(&obs(2499, 8.0, 11, 8)), &minima);
        assert_eq!(b.breaches, vec![RuleId::WxCeilingMinima, RuleId::WxWindLimit]);
    }

    #[test]
    fn test_solo_uses_stricter_minima() {
        let e = DispatchEvaluator::new();
        let minima = MinimaTable::default();
        let stage4 = Stage::new(4).unwrap();
        let weather = obs(2800, 9.0, 8, 6);
        assert!(e
            .assess_observation(SortieType::Nav, stage4, Some(&weather), &minima)
            .is_clear());
        let solo = e.assess_observation(SortieType::Solo, stage4, Some(&weather), &minima);
        assert!(solo.breaches.contains(&RuleId::WxSoloMinima));
        assert!(solo.breaches.contains(&RuleId::WxCeilingMinima));
    }

    #[test]
    fn test_missing_observation_is_conservative() {
        let e = DispatchEvaluator::new();
        let a = e.assess_observation(
            SortieType::Circuits,
            Stage::new(2).unwrap(),
            None,
            &MinimaTable::default(),
        );
        assert_eq!(a.breaches, vec![RuleId::WxObservationUnknown]);
        let sim = e.assess_observation(
            SortieType::SimProcedures,
            Stage::new(2).unwrap(),
            None,
            &MinimaTable::default(),
        );
        assert!(sim.is_clear());
    }

    #[test]
    fn test_thunderstorm_nearby_breaches_otherwise_clear_weather() {
        let e = DispatchEvaluator::new();
        let minima = MinimaTable::default();
        let mut storm = obs(4000, 10.0, 5, 3);
        storm.thunderstorm_within_10nm = true;

        let a = e.assess_observation(SortieType::Circuits, Stage::new(3).unwrap(), Some(&storm), &minima);
        assert_eq!(a.breaches, vec![RuleId::WxThunderstormProximity]);
        assert!(a.rules.contains(&RuleId::WxThunderstormProximity));

        // 有模拟机和模拟机教员: 转模拟机; 否则不放行
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let board = WeatherBoard::new("YBAF", vec![storm]);
        let slot = circuits();

        let with_sim = pool(true);
        let ctx = ValidationContext::new(&with_sim, &config, &rules);
        let converted = e.evaluate(&ctx, &board, &slot, &[slot.clone()]);
        let decision = converted.dispatch.clone().unwrap();
        assert_eq!(decision.outcome, DispatchOutcome::SimConvert);
        assert!(decision.breaches.contains(&RuleId::WxThunderstormProximity));

        let without_sim = pool(false);
        let ctx = ValidationContext::new(&without_sim, &config, &rules);
        let grounded = e.evaluate(&ctx, &board, &slot, &[slot.clone()]);
        let decision = grounded.dispatch.clone().unwrap();
        assert_eq!(decision.outcome, DispatchOutcome::NoGo);
        assert_eq!(decision.breaches, vec![RuleId::WxThunderstormProximity]);
    }

    #[test]
    fn test_low_ceiling_converts_to_sim_when_available() {
        let p = pool(true);
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let ctx = ValidationContext::new(&p, &config, &rules);
        let board = WeatherBoard::new("YBAF", vec![obs(1200, 6.0, 5, 3)]);

        let slot = circuits();
        let result = DispatchEvaluator::new().evaluate(&ctx, &board, &slot, &[slot.clone()]);
        let decision = result.dispatch.clone().unwrap();
        assert_eq!(decision.outcome, DispatchOutcome::SimConvert);
        assert!(decision.breaches.contains(&RuleId::WxCeilingMinima));
        assert!(decision.breaches.contains(&RuleId::WxVisibilityMinima));
        assert_eq!(result.resource, ResourceRef::Simulator("SIM1".to_string()));
        assert_eq!(result.instructor_id.as_deref(), Some("I2"));
        assert_eq!(result.converted_from, Some(ResourceRef::Aircraft("A1".to_string())));
    }

    #[test]
    fn test_low_ceiling_without_sim_instructor_is_no_go() {
        let p = pool(false);
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let ctx = ValidationContext::new(&p, &config, &rules);
        let board = WeatherBoard::new("YBAF", vec![obs(1200, 6.0, 5, 3)]);

        let slot = circuits();
        let e = DispatchEvaluator::new();
        let result = e.evaluate(&ctx, &board, &slot, &[slot.clone()]);
        let decision = result.dispatch.clone().unwrap();
        assert_eq!(decision.outcome, DispatchOutcome::NoGo);
        assert_eq!(decision.breaches.first(), Some(&RuleId::WxCeilingMinima));
        assert!(decision.rules.contains(&RuleId::NoSimAvailable));

        // 同一输入再次评估结论不变
        let again = e.evaluate(&ctx, &board, &result, &[result.clone()]);
        assert_eq!(again.dispatch, result.dispatch);
    }

    #[test]
    fn test_converted_slot_restored_when_weather_clears() {
        let p = pool(true);
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let ctx = ValidationContext::new(&p, &config, &rules);
        let e = DispatchEvaluator::new();

        let bad = WeatherBoard::new("YBAF", vec![obs(1200, 6.0, 5, 3)]);
        let slot = circuits();
        let converted = e.evaluate(&ctx, &bad, &slot, &[slot.clone()]);
        assert_eq!(converted.outcome(), Some(DispatchOutcome::SimConvert));

        let good = bad.with_observation(obs(4000, 10.0, 5, 3));
        let restored = e.evaluate(&ctx, &good, &converted, &[converted.clone()]);
        assert_eq!(restored.outcome(), Some(DispatchOutcome::Go));
        assert_eq!(restored.resource, ResourceRef::Aircraft("A1".to_string()));
        // 转换后的模拟机教员同样具备 CIRCUITS 资质, 优先保留
        assert_eq!(restored.instructor_id.as_deref(), Some("I2"));
        assert!(restored.converted_from.is_none());
    }
}
