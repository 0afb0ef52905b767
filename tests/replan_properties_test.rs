// ==========================================
// 重排性质测试
// ==========================================
// 职责: 验证提交版本的硬约束、确定性、保持时段不变、无重复占用、版本链线性
// ==========================================


#[cfg(test)]
mod replan_properties_test {
    use flight_roster::config::{ChurnPolicy, EngineConfig};
    use flight_roster::domain::disruption::DisruptionEvent;
    use flight_roster::domain::roster::{RosterDiff, RosterVersion};
    use flight_roster::domain::sortie::{Slot, SortieRequest};
    use flight_roster::domain::types::{DisruptionKind, SortieType, TimeWindow};
    use flight_roster::engine::orchestrator::{Deadline, RejectReason, ReplanState, WeekState};
    use flight_roster::engine::validator::{ConstraintValidator, ValidationContext};
    use flight_roster::repository::RosterVersionStore;
    use flight_roster::EngineError;

    use crate::test_helpers::*;

    // ==========================================
    // 测试数据
    // ==========================================

    fn busy_state() -> WeekState {
        week_state(
            pool(
                vec![student("S1", 1), student("S2", 2), student("S3", 3), student("S4", 4)],
                vec![
                    instructor("I1"),
                    instructor("I2"),
                    instructor("I3"),
                    sim_instructor("IS"),
                ],
                vec![
                    aircraft("A1", "C172"),
                    aircraft("A2", "C172"),
                    aircraft("A3", "C172"),
                ],
                vec![simulator("SIM1")],
            ),
            Some(clear_week_board()),
        )
    }

    fn busy_requests() -> Vec<SortieRequest> {
        vec![
            request("R01", "S1", SortieType::Circuits, 1, 0, 8, 12, 60),
            request("R02", "S2", SortieType::Nav, 1, 0, 8, 12, 90),
            request("R03", "S3", SortieType::ChkPrep, 3, 0, 9, 13, 60),
            request("R04", "S4", SortieType::Nav, 1, 0, 13, 17, 120),
            request("R05", "S1", SortieType::SimProcedures, 1, 0, 14, 18, 60),
            request("R06", "S1", SortieType::Circuits, 1, 1, 8, 11, 60),
            request("R07", "S2", SortieType::Circuits, 1, 1, 8, 11, 60),
            request("R08", "S3", SortieType::Nav, 1, 1, 9, 14, 90),
            request("R09", "S4", SortieType::ChkPrep, 3, 1, 10, 15, 60),
            request("R10", "S2", SortieType::SimProcedures, 1, 1, 13, 17, 60),
        ]
    }

    fn busy_events() -> Vec<DisruptionEvent> {
        vec![
            grounding("EV-1", "A1", TimeWindow::day(week())),
            person_unavailable(
                "EV-2",
                DisruptionKind::Instructor,
                "I2",
                TimeWindow::new(at(1, 8, 0), at(1, 12, 0)),
            ),
            weather_event("EV-3", "YSCN", low_cloud(TimeWindow::new(at(0, 13, 0), at(0, 19, 0)))),
            person_unavailable("EV-4", DisruptionKind::Student, "S4", TimeWindow::day(week() + chrono::Duration::days(1))),
        ]
    }

    /// 构建首版并依次回放扰动, 返回完整版本历史
    fn run_busy_week(config: EngineConfig) -> Vec<RosterVersion> {
        let orch = orchestrator(config.clone());
        let mut st = busy_state();
        orch.build_initial(&st, &busy_requests(), Deadline::unbounded())
            .unwrap();
        assert_valid(&config, &st, &orch.latest(week()).unwrap().unwrap().slots);

        for event in busy_events() {
            let outcome = orch
                .apply_disruption(&mut st, &event, Deadline::unbounded())
                .unwrap();
            if let Some(version) = outcome.version() {
                assert_valid(&config, &st, &version.slots);
            }
        }
        orch.store().history(week()).unwrap()
    }

    // ==========================================
    // 断言辅助
    // ==========================================

    fn assert_valid(config: &EngineConfig, st: &WeekState, slots: &[Slot]) {
        let rules = config.rule_set();
        let ctx = ValidationContext::new(&st.pool, config, &rules).with_weather(st.weather.as_ref());
        let result = ConstraintValidator::new().validate_all(&ctx, slots);
        assert!(result.is_ok(), "提交版本存在违规: {:?}", result.violations());
    }

    fn assert_no_double_booking(slots: &[Slot]) {
        for (i, a) in slots.iter().enumerate() {
            for b in slots.iter().skip(i + 1) {
                if !a.overlaps(b) {
                    continue;
                }
                assert_ne!(a.student_id, b.student_id, "{} / {}", a.slot_id, b.slot_id);
                assert_ne!(a.resource, b.resource, "{} / {}", a.slot_id, b.slot_id);
                if let (Some(x), Some(y)) = (&a.instructor_id, &b.instructor_id) {
                    assert_ne!(x, y, "{} / {}", a.slot_id, b.slot_id);
                }
            }
        }
    }

    // ==========================================
    // 性质
    // ==========================================

    #[test]
    fn test_every_committed_version_has_no_double_booking() {
        let history = run_busy_week(EngineConfig::default());
        assert!(history.len() > 1);
        for version in &history {
            assert_no_double_booking(&version.slots);
        }
    }

    #[test]
    fn test_version_chain_is_linear_and_diff_reconstructible() {
        let history = run_busy_week(EngineConfig::default());
        assert_eq!(history[0].seq, 0);
        assert_eq!(history[0].parent_seq, None);
        for pair in history.windows(2) {
            let (parent, child) = (&pair[0], &pair[1]);
            assert_eq!(child.seq, parent.seq + 1);
            assert_eq!(child.parent_seq, Some(parent.seq));
            assert!(child.disruption_id.is_some());
            assert_eq!(child.diff, RosterDiff::between(&parent.slots, &child.slots));
        }
    }

    #[test]
    fn test_identical_inputs_produce_identical_history() {
        let first = serde_json::to_string(&run_busy_week(EngineConfig::default())).unwrap();
        let second = serde_json::to_string(&run_busy_week(EngineConfig::default())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unaffected_slots_are_held_identical() {
        let config = EngineConfig::default();
        let orch = orchestrator(config);
        let mut st = busy_state();
        let v0 = orch
            .build_initial(&st, &busy_requests(), Deadline::unbounded())
            .unwrap();

        // S4 周二全天不可用: 只影响 S4 当天的时段
        let event = person_unavailable(
            "EV-S4",
            DisruptionKind::Student,
            "S4",
            TimeWindow::day(week() + chrono::Duration::days(1)),
        );
        let outcome = orch
            .apply_disruption(&mut st, &event, Deadline::unbounded())
            .unwrap();
        let v1 = outcome.version().unwrap();

        assert!(!v1.churn_exceeded);
        for parent_slot in &v0.slots {
            let touched = parent_slot.student_id == "S4" && parent_slot.date() != week();
            if touched {
                assert!(v1.slot(&parent_slot.slot_id).is_none());
                continue;
            }
            assert_eq!(v1.slot(&parent_slot.slot_id), Some(parent_slot));
        }
        assert!(v1
            .unplaced
            .iter()
            .any(|u| u.request.request_id == "R09"));
    }

    #[test]
    fn test_commit_flagged_marks_high_churn() {
        let config = EngineConfig {
            churn_target: 0.0,
            ..EngineConfig::default()
        };
        let history = run_busy_week(config);
        // 首版 churn 定义为 0, 不标记
        assert!(!history[0].churn_exceeded);
        assert!(history
            .iter()
            .skip(1)
            .filter(|v| v.churn > 0.0)
            .all(|v| v.churn_exceeded));
    }

    #[test]
    fn test_fail_closed_keeps_prior_version_authoritative() {
        let config = EngineConfig {
            churn_target: 0.0,
            churn_policy: ChurnPolicy::FailClosed,
            ..EngineConfig::default()
        };
        let orch = orchestrator(config);
        let mut st = busy_state();
        let v0 = orch
            .build_initial(&st, &busy_requests(), Deadline::unbounded())
            .unwrap();
        let before = st.clone();

        let outcome = orch
            .apply_disruption(
                &mut st,
                &grounding("EV-1", "A1", TimeWindow::day(week())),
                Deadline::unbounded(),
            )
            .unwrap();

        assert!(!outcome.is_committed());
        assert!(matches!(
            outcome.reject_reason(),
            Some(RejectReason::ChurnExceeded { .. })
        ));
        assert_eq!(outcome.transitions().first(), Some(&ReplanState::Assess));
        assert_eq!(outcome.transitions().last(), Some(&ReplanState::Rejected));
        assert_eq!(st, before);
        assert_eq!(orch.latest(week()).unwrap().unwrap(), v0);
    }

    #[test]
    fn test_committed_transitions_follow_state_machine() {
        let orch = orchestrator(EngineConfig::default());
        let mut st = busy_state();
        orch.build_initial(&st, &busy_requests(), Deadline::unbounded())
            .unwrap();

        let outcome = orch
            .apply_disruption(
                &mut st,
                &person_unavailable("EV-S3", DisruptionKind::Student, "S3", TimeWindow::new(at(4, 7, 0), at(4, 8, 0))),
                Deadline::unbounded(),
            )
            .unwrap();
        assert_eq!(
            outcome.transitions(),
            &[
                ReplanState::Assess,
                ReplanState::Generate,
                ReplanState::Validate,
                ReplanState::Commit,
                ReplanState::Committed,
            ]
        );
    }

    /// 两个时段共用 A1 / I1: R1 08:00, R2 10:00
    fn shared_aircraft_week() -> (flight_roster::ReplanOrchestrator, WeekState) {
        let orch = orchestrator(EngineConfig::default());
        let st = week_state(
            pool(
                vec![student("S1", 1), student("S2", 1)],
                vec![instructor("I1"), instructor("I2")],
                vec![aircraft("A1", "C172"), aircraft("A2", "C172")],
                vec![],
            ),
            None,
        );
        let v0 = orch
            .build_initial(
                &st,
                &[circuits("R1", "S1", 0, 8), circuits("R2", "S2", 0, 10)],
                Deadline::unbounded(),
            )
            .unwrap();
        assert!(v0.slots.iter().all(|s| s.resource.id() == "A1"));
        (orch, st)
    }

    #[test]
    fn test_high_churn_retries_once_with_one_hop_scope() {
        let (orch, mut st) = shared_aircraft_week();

        // 只有 R1 直接受影响; R2 同日共用 A1 / I1, 属于一跳邻居
        let event = grounding("EV-1", "A1", TimeWindow::new(at(0, 8, 0), at(0, 9, 0)));
        let outcome = orch
            .apply_disruption(&mut st, &event, Deadline::unbounded())
            .unwrap();

        assert_eq!(
            outcome.transitions(),
            &[
                ReplanState::Assess,
                ReplanState::Generate,
                ReplanState::Validate,
                ReplanState::Commit,
                ReplanState::Generate,
                ReplanState::Validate,
                ReplanState::Commit,
                ReplanState::Committed,
            ]
        );
        let version = outcome.version().unwrap();
        assert_eq!(version.churn, 0.5);
        assert!(version.churn_exceeded);
        assert_eq!(version.slot("SLOT-R1").unwrap().resource.id(), "A2");
        assert_eq!(version.slot("SLOT-R2").unwrap().resource.id(), "A1");
    }

    #[test]
    fn test_high_churn_without_larger_scope_skips_retry() {
        let (orch, mut st) = shared_aircraft_week();

        // 全天停飞: 两个时段都直接受影响, 一跳扩展不再增大范围
        let event = grounding("EV-1", "A1", TimeWindow::day(week()));
        let outcome = orch
            .apply_disruption(&mut st, &event, Deadline::unbounded())
            .unwrap();

        assert_eq!(
            outcome.transitions(),
            &[
                ReplanState::Assess,
                ReplanState::Generate,
                ReplanState::Validate,
                ReplanState::Commit,
                ReplanState::Committed,
            ]
        );
        assert_eq!(outcome.version().unwrap().churn, 1.0);
    }

    #[test]
    fn test_unknown_resource_is_inconsistency_and_nothing_commits() {
        let orch = orchestrator(EngineConfig::default());
        let mut st = busy_state();
        orch.build_initial(&st, &busy_requests(), Deadline::unbounded())
            .unwrap();

        let err = orch
            .apply_disruption(
                &mut st,
                &grounding("EV-X", "A404", TimeWindow::day(week())),
                Deadline::unbounded(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::DisruptionInconsistency { .. }));
        assert_eq!(orch.store().history(week()).unwrap().len(), 1);
    }

    #[test]
    fn test_weather_event_for_other_airfield_is_inconsistency() {
        let orch = orchestrator(EngineConfig::default());
        let mut st = busy_state();
        orch.build_initial(&st, &busy_requests(), Deadline::unbounded())
            .unwrap();

        let event = weather_event("EV-W", "YMML", low_cloud(TimeWindow::day(week())));
        let err = orch
            .apply_disruption(&mut st, &event, Deadline::unbounded())
            .unwrap_err();
        assert!(matches!(err, EngineError::DisruptionInconsistency { .. }));
    }
}
