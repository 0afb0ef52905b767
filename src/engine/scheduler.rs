// ==========================================
// 飞行训练排班系统 - 贪心优先级排班器
// ==========================================
// 职责: 请求 + 资源池 (+ 已有排班) → 已落位时段 + 未落位请求
// 算法: 单遍首次适配
// - 请求按 PrioritySorter 排序
// - 候选枚举顺序固定: 时间升序 → 资源ID → 教员ID (SOLO 无教员)
// - 每个候选在"逐步更新"的快照上校验, 首个可行候选即落位
// - 不跨请求回溯; 单请求候选数有上限
// 红线: 无可行候选不是错误, 记录为未落位 (附首个失败规则)
// ==========================================

use crate::domain::resource::ResourcePool;
use crate::domain::rule::RuleId;
use crate::domain::sortie::{ResourceRef, Slot, SortieRequest, UnplacedRequest};
use crate::domain::types::{SortieCategory, TimeWindow};
use crate::engine::priority::PrioritySorter;
use crate::engine::validator::{ConstraintValidator, ValidationContext, ValidationOutcome};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, instrument};

// ==========================================
// ScheduleOutcome - 排班结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    pub placed: Vec<Slot>,
    pub unplaced: Vec<UnplacedRequest>,
    pub candidates_examined: usize,
}

impl ScheduleOutcome {
    /// 要求全部请求落位
    ///
    /// 存在未落位请求时, 以第一个未落位请求返回 InfeasibleRequest
    pub fn require_all_placed(mut self) -> EngineResult<Vec<Slot>> {
        if self.unplaced.is_empty() {
            return Ok(self.placed);
        }
        Err(self.unplaced.swap_remove(0).into())
    }
}

// ==========================================
// GreedyScheduler - 贪心排班器
// ==========================================
pub struct GreedyScheduler {
    sorter: PrioritySorter,
    validator: ConstraintValidator,
}

impl GreedyScheduler {
    pub fn new() -> Self {
        Self {
            sorter: PrioritySorter::new(),
            validator: ConstraintValidator::new(),
        }
    }

    /// 执行排班
    ///
    /// # 参数
    /// - `ctx`: 校验上下文 (气象一致性不在排班阶段检查)
    /// - `requests`: 待排请求
    /// - `existing`: 已有时段 (重排时为保持不动的时段)
    /// - `horizon`: 候选时间限制 (重排时限定在当前周)
    ///
    /// # 返回
    /// 新落位的时段 (不含 existing) 与未落位请求
    #[instrument(skip_all, fields(requests = requests.len(), existing = existing.len()))]
    pub fn schedule(
        &self,
        ctx: &ValidationContext<'_>,
        requests: &[SortieRequest],
        existing: &[Slot],
        horizon: Option<TimeWindow>,
    ) -> ScheduleOutcome {
        let plain = ctx.without_weather();
        let sorted = self
            .sorter
            .sort(requests.to_vec(), ctx.pool, ctx.config);

        let mut roster: Vec<Slot> = existing.to_vec();
        let mut outcome = ScheduleOutcome::default();

        for request in sorted {
            let starts = candidate_starts(&request, ctx.config, horizon);
            let resources = candidate_resources(&request, ctx.pool);
            let instructors = candidate_instructors(&request, ctx.pool);

            let mut budget = ctx.config.max_candidates_per_request;
            let mut first_failure: Option<Vec<RuleId>> = None;
            let mut found: Option<Slot> = None;

            'search: for start in &starts {
                for resource in &resources {
                    for instructor in &instructors {
                        if budget == 0 {
                            debug!(request_id = %request.request_id, "候选数达到上限");
                            break 'search;
                        }
                        budget -= 1;
                        outcome.candidates_examined += 1;

                        let candidate =
                            Slot::from_request(&request, *start, instructor.clone(), resource.clone());
                        match self.validator.validate(&plain, &candidate, &roster) {
                            ValidationOutcome::Ok => {
                                found = Some(candidate);
                                break 'search;
                            }
                            ValidationOutcome::Violated(rules) => {
                                if first_failure.is_none() {
                                    first_failure = Some(rules);
                                }
                            }
                        }
                    }
                }
            }

            match found {
                Some(slot) => {
                    debug!(
                        request_id = %request.request_id,
                        start = %slot.start,
                        resource = %slot.resource,
                        instructor_id = ?slot.instructor_id,
                        "请求已落位"
                    );
                    roster.push(slot.clone());
                    outcome.placed.push(slot);
                }
                None => {
                    let violations = first_failure.unwrap_or_default();
                    let reason = violations.first().copied().unwrap_or(RuleId::NoCandidate);
                    debug!(request_id = %request.request_id, reason = %reason, "请求未能落位");
                    outcome.unplaced.push(UnplacedRequest {
                        request,
                        reason,
                        violations,
                    });
                }
            }
        }

        info!(
            placed = outcome.placed.len(),
            unplaced = outcome.unplaced.len(),
            candidates = outcome.candidates_examined,
            "排班完成"
        );
        outcome
    }
}

impl Default for GreedyScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// 候选开始时间: 每日运行时段内, 自窗口开始按步长递增
fn candidate_starts(
    request: &SortieRequest,
    config: &EngineConfig,
    horizon: Option<TimeWindow>,
) -> Vec<NaiveDateTime> {
    let duration = Duration::minutes(request.duration_minutes);
    if duration <= Duration::zero() {
        return Vec::new();
    }
    let window = match horizon {
        Some(h) => match request.window.intersect(&h) {
            Some(w) => w,
            None => return Vec::new(),
        },
        None => request.window,
    };
    let step = Duration::minutes(config.candidate_step_minutes.max(1));

    let mut starts = Vec::new();
    let mut date = window.start.date();
    while date <= window.end.date() {
        let open = date.and_time(config.operating_open);
        let close = date.and_time(config.operating_close);
        let limit = close.min(window.end);
        let mut t = open.max(window.start);
        while t + duration <= limit {
            starts.push(t);
            t += step;
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    starts
}

/// 候选资源: FLIGHT → 飞机 (按指定机型过滤), SIM → 模拟机
fn candidate_resources(request: &SortieRequest, pool: &ResourcePool) -> Vec<ResourceRef> {
    match request.sortie_type.category() {
        SortieCategory::Flight => pool
            .aircraft
            .values()
            .filter(|a| {
                request
                    .aircraft_type
                    .as_ref()
                    .map(|t| &a.aircraft_type == t)
                    .unwrap_or(true)
            })
            .map(|a| ResourceRef::Aircraft(a.aircraft_id.clone()))
            .collect(),
        SortieCategory::Sim => pool
            .simulators
            .keys()
            .map(|id| ResourceRef::Simulator(id.clone()))
            .collect(),
    }
}

fn candidate_instructors(request: &SortieRequest, pool: &ResourcePool) -> Vec<Option<String>> {
    if request.sortie_type.is_solo() {
        vec![None]
    } else {
        pool.instructors.keys().map(|id| Some(id.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{Aircraft, Instructor, Student};
    use crate::domain::types::{AircraftStatus, SortieType, Stage};
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_hms_opt(h, m, 0).unwrap()
    }

    fn pool(aircraft: &[&str]) -> ResourcePool {
        let student = |id: &str| Student {
            student_id: id.to_string(),
            stage: Stage::new(2).unwrap(),
            solo_eligible: true,
            solo_endorsed_on: Some(day() - Duration::days(120)),
            flight_minutes_today: 0,
            unavailable: vec![],
        };
        let instructor = |id: &str| Instructor {
            instructor_id: id.to_string(),
            qualified_types: [SortieType::Circuits, SortieType::Nav, SortieType::ChkPrep]
                .into_iter()
                .collect(),
            sim_instructor: false,
            currency_date: Some(day()),
            duty_minutes_today: 0,
            last_duty_end: None,
            unavailable: vec![],
        };
        ResourcePool::new(
            day(),
            vec![student("S1"), student("S2")],
            vec![instructor("I1"), instructor("I2")],
            aircraft
                .iter()
                .map(|id| Aircraft {
                    aircraft_id: id.to_string(),
                    aircraft_type: "C172".to_string(),
                    status: AircraftStatus::Available,
                    sorties_today: 0,
                    last_slot_end: None,
                    blackouts: vec![],
                })
                .collect(),
            vec![],
        )
    }

    fn request(id: &str, student: &str, sortie_type: SortieType, from: (u32, u32), to: (u32, u32)) -> SortieRequest {
        SortieRequest {
            request_id: id.to_string(),
            student_id: student.to_string(),
            sortie_type,
            required_stage: Stage::new(1).unwrap(),
            window: TimeWindow::new(at(from.0, from.1), at(to.0, to.1)),
            duration_minutes: 60,
            aircraft_type: None,
        }
    }

    #[test]
    fn test_candidate_starts_respect_operating_hours() {
        let config = EngineConfig::default();
        let r = request("R1", "S1", SortieType::Circuits, (5, 0), (9, 0));
        let starts = candidate_starts(&r, &config, None);
        assert_eq!(starts, vec![at(7, 0), at(7, 30), at(8, 0)]);
    }

    #[test]
    fn test_competing_requests_never_double_book() {
        let p = pool(&["B"]);
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let ctx = ValidationContext::new(&p, &config, &rules);

        // 同一窗口只容纳一个时段
        let requests = vec![
            request("R1", "S1", SortieType::Circuits, (8, 0), (9, 0)),
            request("R2", "S2", SortieType::ChkPrep, (8, 0), (9, 0)),
        ];
        let out = GreedyScheduler::new().schedule(&ctx, &requests, &[], None);
        assert_eq!(out.placed.len(), 1);
        assert_eq!(out.placed[0].request_id, "R2");
        assert_eq!(out.unplaced.len(), 1);
        assert_eq!(out.unplaced[0].request.request_id, "R1");
        assert_eq!(out.unplaced[0].reason, RuleId::BookingExclusivity);
    }

    #[test]
    fn test_second_request_moves_to_other_aircraft() {
        let p = pool(&["A", "B"]);
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let ctx = ValidationContext::new(&p, &config, &rules);

        let requests = vec![
            request("R1", "S1", SortieType::Circuits, (8, 0), (9, 0)),
            request("R2", "S2", SortieType::Circuits, (8, 0), (9, 0)),
        ];
        let out = GreedyScheduler::new().schedule(&ctx, &requests, &[], None);
        assert!(out.unplaced.is_empty());
        let r2 = out.placed.iter().find(|s| s.request_id == "R2").unwrap();
        assert_eq!(r2.resource, ResourceRef::Aircraft("B".to_string()));
        assert_eq!(r2.instructor_id.as_deref(), Some("I2"));
    }

    #[test]
    fn test_expired_endorsement_keeps_solo_unplaced() {
        let p = pool(&["A"]);
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let ctx = ValidationContext::new(&p, &config, &rules);

        let requests = vec![request("R1", "S1", SortieType::Solo, (8, 0), (12, 0))];
        let out = GreedyScheduler::new().schedule(&ctx, &requests, &[], None);
        assert!(out.placed.is_empty());
        assert_eq!(out.unplaced[0].reason, RuleId::SoloEndorsement);

        let err = out.require_all_placed().unwrap_err();
        assert!(matches!(
            err,
            crate::error::EngineError::InfeasibleRequest { ref request_id, ref rule }
                if request_id == "R1" && rule == "SOLO_ENDORSEMENT"
        ));
    }

    #[test]
    fn test_require_all_placed_returns_slots() {
        let p = pool(&["A", "B"]);
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let ctx = ValidationContext::new(&p, &config, &rules);

        let requests = vec![request("R1", "S1", SortieType::Circuits, (8, 0), (9, 0))];
        let slots = GreedyScheduler::new()
            .schedule(&ctx, &requests, &[], None)
            .require_all_placed()
            .unwrap();
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn test_no_candidate_when_window_outside_horizon() {
        let p = pool(&["A"]);
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let ctx = ValidationContext::new(&p, &config, &rules);

        let requests = vec![request("R1", "S1", SortieType::Circuits, (8, 0), (9, 0))];
        let horizon = TimeWindow::day(day() + Duration::days(1));
        let out = GreedyScheduler::new().schedule(&ctx, &requests, &[], Some(horizon));
        assert_eq!(out.unplaced[0].reason, RuleId::NoCandidate);
        assert_eq!(out.candidates_examined, 0);
    }
}
