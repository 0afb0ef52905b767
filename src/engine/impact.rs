// ==========================================
// 飞行训练排班系统 - 扰动影响评估 (ASSESS)
// ==========================================
// 职责:
// - 将扰动事件应用到资源池/气象板, 得到新的只读输入
// - 计算受影响时段: 直接受影响 + 新状态下不再可行的时段
// - 扩展范围: 一跳邻居 (同日共享学员/教员/飞机或模拟机)
// 红线: 只向外扩展一跳, 不做传递闭包
// ==========================================

use crate::domain::disruption::{DisruptionEvent, DisruptionState};
use crate::domain::resource::ResourcePool;
use crate::domain::sortie::{ResourceRef, Slot};
use crate::domain::types::{AircraftStatus, DisruptionKind, SortieCategory};
use crate::domain::weather::WeatherBoard;
use crate::engine::validator::{ConstraintValidator, ValidationContext};
use crate::error::{EngineError, EngineResult};
use std::collections::BTreeSet;

// ==========================================
// ImpactAssessor - 影响评估器
// ==========================================
pub struct ImpactAssessor {
    validator: ConstraintValidator,
}

impl ImpactAssessor {
    pub fn new() -> Self {
        Self {
            validator: ConstraintValidator::new(),
        }
    }

    /// 直接受影响的时段: 在生效窗口内使用被扰动资源
    ///
    /// WEATHER 事件影响窗口内所有 FLIGHT 类科目 (含已转模拟机的时段)
    pub fn direct_slots(&self, event: &DisruptionEvent, slots: &[Slot]) -> BTreeSet<String> {
        slots
            .iter()
            .filter(|s| s.time_window().overlaps(&event.window))
            .filter(|s| match event.kind {
                DisruptionKind::Weather => s.sortie_type.category() == SortieCategory::Flight,
                // 恢复可用不使任何时段失效
                DisruptionKind::Aircraft => {
                    !matches!(
                        event.new_state,
                        DisruptionState::AircraftStatus(AircraftStatus::Available)
                    ) && matches!(&s.resource, ResourceRef::Aircraft(id) if id == &event.resource_id)
                }
                DisruptionKind::Instructor => {
                    s.instructor_id.as_deref() == Some(event.resource_id.as_str())
                }
                DisruptionKind::Student => s.student_id == event.resource_id,
            })
            .map(|s| s.slot_id.clone())
            .collect()
    }

    /// 在新资源状态下不再满足硬约束的时段
    pub fn invalidated_slots(&self, ctx: &ValidationContext<'_>, slots: &[Slot]) -> BTreeSet<String> {
        let plain = ctx.without_weather();
        slots
            .iter()
            .filter(|s| !self.validator.validate(&plain, s, slots).is_ok())
            .map(|s| s.slot_id.clone())
            .collect()
    }

    /// ASSESS: 直接受影响 ∪ 不再可行
    pub fn assess(
        &self,
        ctx: &ValidationContext<'_>,
        event: &DisruptionEvent,
        slots: &[Slot],
    ) -> BTreeSet<String> {
        let mut affected = self.direct_slots(event, slots);
        if event.kind != DisruptionKind::Weather {
            affected.extend(self.invalidated_slots(ctx, slots));
        }
        affected
    }

    /// 一跳扩展: 与受影响时段同日且共享资源的时段
    pub fn expand_one_hop(&self, slots: &[Slot], affected: &BTreeSet<String>) -> BTreeSet<String> {
        let seeds: Vec<&Slot> = slots
            .iter()
            .filter(|s| affected.contains(&s.slot_id))
            .collect();

        let mut expanded = affected.clone();
        for slot in slots {
            if affected.contains(&slot.slot_id) {
                continue;
            }
            let neighbour = seeds
                .iter()
                .any(|seed| seed.date() == slot.date() && seed.shares_resource(slot));
            if neighbour {
                expanded.insert(slot.slot_id.clone());
            }
        }
        expanded
    }
}

impl Default for ImpactAssessor {
    fn default() -> Self {
        Self::new()
    }
}

/// 将扰动应用到资源池/气象板 (输入不变, 返回新副本)
///
/// # 错误
/// - DisruptionInconsistency: 引用未知资源 / 未知机场
/// - Input: 类型与新状态不匹配
pub fn apply_event(
    event: &DisruptionEvent,
    pool: &ResourcePool,
    board: Option<&WeatherBoard>,
) -> EngineResult<(ResourcePool, Option<WeatherBoard>)> {
    let unknown = |what: &str| EngineError::DisruptionInconsistency {
        event_id: event.event_id.clone(),
        message: format!("未知{}: {}", what, event.resource_id),
    };

    match (&event.kind, &event.new_state) {
        (DisruptionKind::Weather, DisruptionState::Weather(obs)) => {
            let mut obs = obs.clone();
            obs.window = event.window;
            let next = match board {
                Some(b) if !b.airfield.is_empty() && b.airfield != event.resource_id => {
                    return Err(unknown("机场"));
                }
                Some(b) => b.with_observation(obs),
                None => WeatherBoard::new(&event.resource_id, vec![obs]),
            };
            Ok((pool.clone(), Some(next)))
        }
        (DisruptionKind::Aircraft, DisruptionState::AircraftStatus(status)) => {
            let mut next = pool.clone();
            let aircraft = next
                .aircraft
                .get_mut(&event.resource_id)
                .ok_or_else(|| unknown("飞机"))?;
            match status {
                AircraftStatus::Available => {
                    aircraft.status = AircraftStatus::Available;
                    aircraft.blackouts.retain(|b| !b.overlaps(&event.window));
                }
                AircraftStatus::Maintenance | AircraftStatus::Grounded => {
                    aircraft.blackouts.push(event.window);
                }
            }
            Ok((next, board.cloned()))
        }
        (DisruptionKind::Instructor, DisruptionState::Unavailable) => {
            let mut next = pool.clone();
            next.instructors
                .get_mut(&event.resource_id)
                .ok_or_else(|| unknown("教员"))?
                .unavailable
                .push(event.window);
            Ok((next, board.cloned()))
        }
        (DisruptionKind::Student, DisruptionState::Unavailable) => {
            let mut next = pool.clone();
            next.students
                .get_mut(&event.resource_id)
                .ok_or_else(|| unknown("学员"))?
                .unavailable
                .push(event.window);
            Ok((next, board.cloned()))
        }
        _ => Err(EngineError::Input(format!(
            "扰动类型与新状态不匹配: event_id={}, kind={}",
            event.event_id, event.kind
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{Aircraft, Instructor, Student};
    use crate::domain::sortie::SortieRequest;
    use crate::domain::types::{SortieType, Stage, TimeWindow};
    use chrono::{NaiveDate, NaiveDateTime};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn slot(req: &str, student: &str, instructor: &str, aircraft: &str, start: NaiveDateTime) -> Slot {
        let request = SortieRequest {
            request_id: req.to_string(),
            student_id: student.to_string(),
            sortie_type: SortieType::Circuits,
            required_stage: Stage::new(1).unwrap(),
            window: TimeWindow::week(day()),
            duration_minutes: 60,
            aircraft_type: None,
        };
        Slot::from_request(
            &request,
            start,
            Some(instructor.to_string()),
            ResourceRef::Aircraft(aircraft.to_string()),
        )
    }

    fn pool() -> ResourcePool {
        ResourcePool::new(
            day(),
            vec![Student {
                student_id: "S1".to_string(),
                stage: Stage::new(1).unwrap(),
                solo_eligible: false,
                solo_endorsed_on: None,
                flight_minutes_today: 0,
                unavailable: vec![],
            }],
            vec![Instructor {
                instructor_id: "I1".to_string(),
                qualified_types: [SortieType::Circuits].into_iter().collect(),
                sim_instructor: false,
                currency_date: Some(day()),
                duty_minutes_today: 0,
                last_duty_end: None,
                unavailable: vec![],
            }],
            vec![Aircraft {
                aircraft_id: "A".to_string(),
                aircraft_type: "C172".to_string(),
                status: AircraftStatus::Available,
                sorties_today: 0,
                last_slot_end: None,
                blackouts: vec![],
            }],
            vec![],
        )
    }

    #[test]
    fn test_direct_slots_limited_to_window_and_resource() {
        let slots = vec![
            slot("R1", "S1", "I1", "A", at(2, 8)),
            slot("R2", "S2", "I2", "A", at(2, 13)),
            slot("R3", "S3", "I3", "B", at(2, 8)),
            slot("R4", "S4", "I4", "A", at(3, 8)),
        ];
        let event = DisruptionEvent::new(
            DisruptionKind::Aircraft,
            "A",
            TimeWindow::day(day()),
            DisruptionState::AircraftStatus(AircraftStatus::Grounded),
        );
        let direct = ImpactAssessor::new().direct_slots(&event, &slots);
        let ids: Vec<_> = direct.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["SLOT-R1", "SLOT-R2"]);
    }

    #[test]
    fn test_one_hop_expansion_is_same_day_only() {
        let slots = vec![
            slot("R1", "S1", "I1", "A", at(2, 8)),
            slot("R2", "S2", "I1", "B", at(2, 10)),
            slot("R3", "S3", "I9", "C", at(2, 10)),
            slot("R4", "S4", "I1", "D", at(3, 8)),
            slot("R5", "S2", "I8", "E", at(2, 14)),
        ];
        let affected: BTreeSet<String> = ["SLOT-R1".to_string()].into_iter().collect();
        let expanded = ImpactAssessor::new().expand_one_hop(&slots, &affected);
        let ids: Vec<_> = expanded.iter().map(String::as_str).collect();
        // R5 只与 R2 共享学员, 属于第二跳
        assert_eq!(ids, vec!["SLOT-R1", "SLOT-R2"]);
    }

    #[test]
    fn test_apply_event_rejects_unknown_resource() {
        let event = DisruptionEvent::new(
            DisruptionKind::Instructor,
            "I404",
            TimeWindow::day(day()),
            DisruptionState::Unavailable,
        );
        let err = apply_event(&event, &pool(), None).unwrap_err();
        assert!(matches!(err, EngineError::DisruptionInconsistency { .. }));
    }

    #[test]
    fn test_apply_grounding_adds_blackout() {
        let event = DisruptionEvent::new(
            DisruptionKind::Aircraft,
            "A",
            TimeWindow::new(at(2, 12), at(2, 19)),
            DisruptionState::AircraftStatus(AircraftStatus::Grounded),
        );
        let (next, board) = apply_event(&event, &pool(), None).unwrap();
        let a = next.aircraft("A").unwrap();
        assert!(a.is_dispatchable(&TimeWindow::new(at(2, 8), at(2, 9))));
        assert!(!a.is_dispatchable(&TimeWindow::new(at(2, 13), at(2, 14))));
        assert!(board.is_none());
    }
}
