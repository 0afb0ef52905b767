// ==========================================
// 典型场景测试
// ==========================================
// 职责: 覆盖放行评估、停飞重排、单飞签注、资源争用、零扰动首版
// ==========================================


#[cfg(test)]
mod scenario_test {
    use chrono::Duration;
    use flight_roster::config::EngineConfig;
    use flight_roster::domain::rule::RuleId;
    use flight_roster::domain::sortie::{ResourceRef, Slot};
    use flight_roster::domain::types::{DispatchOutcome, SortieType, TimeWindow};
    use flight_roster::domain::weather::WeatherBoard;
    use flight_roster::engine::dispatch::DispatchEvaluator;
    use flight_roster::engine::orchestrator::Deadline;
    use flight_roster::engine::validator::{ConstraintValidator, ValidationContext, ValidationOutcome};

    use crate::test_helpers::*;

    // ==========================================
    // 场景1: 低云下的一阶段本场训练
    // ==========================================

    #[test]
    fn test_low_ceiling_converts_to_simulator_when_one_is_free() {
        let config = EngineConfig::default();
        let orch = orchestrator(config);
        let board = WeatherBoard::new("YSCN", vec![low_cloud(TimeWindow::week(week()))]);
        let st = week_state(
            pool(
                vec![student("S1", 1)],
                vec![instructor("I1"), sim_instructor("I2")],
                vec![aircraft("A1", "C172")],
                vec![simulator("SIM1")],
            ),
            Some(board),
        );

        let v0 = orch
            .build_initial(&st, &[circuits("R1", "S1", 0, 8)], Deadline::unbounded())
            .unwrap();

        let slot = v0.slot("SLOT-R1").unwrap();
        let decision = slot.dispatch.as_ref().unwrap();
        assert_eq!(decision.outcome, DispatchOutcome::SimConvert);
        assert!(decision.breaches.contains(&RuleId::WxCeilingMinima));
        assert!(decision.rules.contains(&RuleId::SimFallback));
        assert_eq!(slot.resource, ResourceRef::Simulator("SIM1".to_string()));
        assert_eq!(slot.instructor_id.as_deref(), Some("I2"));
        assert_eq!(
            slot.converted_from,
            Some(ResourceRef::Aircraft("A1".to_string()))
        );
    }

    #[test]
    fn test_low_ceiling_without_simulator_is_no_go() {
        let orch = orchestrator(EngineConfig::default());
        let board = WeatherBoard::new("YSCN", vec![low_cloud(TimeWindow::week(week()))]);
        let st = week_state(
            pool(
                vec![student("S1", 1)],
                vec![instructor("I1")],
                vec![aircraft("A1", "C172")],
                vec![],
            ),
            Some(board),
        );

        let v0 = orch
            .build_initial(&st, &[circuits("R1", "S1", 0, 8)], Deadline::unbounded())
            .unwrap();

        let slot = v0.slot("SLOT-R1").unwrap();
        let decision = slot.dispatch.as_ref().unwrap();
        assert_eq!(decision.outcome, DispatchOutcome::NoGo);
        assert_eq!(
            decision.breaches,
            vec![RuleId::WxCeilingMinima, RuleId::WxVisibilityMinima]
        );
        // 评估过的规则全部列出 (含通过的)
        assert!(decision.rules.contains(&RuleId::WxWindLimit));
        assert!(decision.rules.contains(&RuleId::NoSimAvailable));
        assert_eq!(slot.resource, ResourceRef::Aircraft("A1".to_string()));
    }

    #[test]
    fn test_minima_exactly_at_threshold_is_go() {
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let p = pool(
            vec![student("S1", 1)],
            vec![instructor("I1")],
            vec![aircraft("A1", "C172")],
            vec![],
        );
        let board = WeatherBoard::new(
            "YSCN",
            vec![observation(TimeWindow::week(week()), Some(2500), 8.0, 10, 8)],
        );
        let ctx = ValidationContext::new(&p, &config, &rules);
        let slot = Slot::from_request(
            &circuits("R1", "S1", 0, 8),
            at(0, 8, 0),
            Some("I1".to_string()),
            ResourceRef::Aircraft("A1".to_string()),
        );

        let evaluator = DispatchEvaluator::new();
        let first = evaluator.evaluate(&ctx, &board, &slot, &[]);
        assert_eq!(first.outcome(), Some(DispatchOutcome::Go));

        // 同一时段/气象重复评估结果一致
        let second = evaluator.evaluate(&ctx, &board, &slot, &[]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_observation_is_conservative_no_go() {
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let p = pool(
            vec![student("S1", 1)],
            vec![instructor("I1")],
            vec![aircraft("A1", "C172")],
            vec![],
        );
        // 观测只覆盖周二
        let board = WeatherBoard::new(
            "YSCN",
            vec![observation(window(1, 0, 23), None, 10.0, 5, 3)],
        );
        let ctx = ValidationContext::new(&p, &config, &rules);
        let slot = Slot::from_request(
            &circuits("R1", "S1", 0, 8),
            at(0, 8, 0),
            Some("I1".to_string()),
            ResourceRef::Aircraft("A1".to_string()),
        );

        let decided = DispatchEvaluator::new().evaluate(&ctx, &board, &slot, &[]);
        let decision = decided.dispatch.unwrap();
        assert_eq!(decision.outcome, DispatchOutcome::NoGo);
        assert_eq!(decision.breaches, vec![RuleId::WxObservationUnknown]);
    }

    #[test]
    fn test_sim_procedures_always_go() {
        let orch = orchestrator(EngineConfig::default());
        let board = WeatherBoard::new("YSCN", vec![low_cloud(TimeWindow::week(week()))]);
        let st = week_state(
            pool(
                vec![student("S1", 1)],
                vec![sim_instructor("I9")],
                vec![],
                vec![simulator("SIM1")],
            ),
            Some(board),
        );
        let req = request("R1", "S1", SortieType::SimProcedures, 1, 0, 8, 10, 60);

        let v0 = orch.build_initial(&st, &[req], Deadline::unbounded()).unwrap();
        let decision = v0.slot("SLOT-R1").unwrap().dispatch.clone().unwrap();
        assert_eq!(decision.outcome, DispatchOutcome::Go);
        assert_eq!(decision.rules, vec![RuleId::WxSimNoWeather]);
    }

    // ==========================================
    // 场景2: 飞机当日停飞
    // ==========================================

    /// A1: R1 08:00 / R2 10:00, A2: R3 08:00 / R4 10:00
    fn two_aircraft_day(spare: bool) -> (Vec<flight_roster::SortieRequest>, flight_roster::WeekState) {
        let mut fleet = vec![aircraft("A1", "C172"), aircraft("A2", "C172")];
        if spare {
            fleet.push(aircraft("A3", "C172"));
        }
        let st = week_state(
            pool(
                vec![student("S1", 1), student("S2", 1), student("S3", 1), student("S4", 1)],
                vec![instructor("I1"), instructor("I2")],
                fleet,
                vec![],
            ),
            None,
        );
        let requests = vec![
            circuits("R1", "S1", 0, 8),
            circuits("R2", "S2", 0, 10),
            circuits("R3", "S3", 0, 8),
            circuits("R4", "S4", 0, 10),
        ];
        (requests, st)
    }

    #[test]
    fn test_grounding_without_spare_leaves_both_slots_unplaced() {
        let orch = orchestrator(EngineConfig::default());
        let (requests, mut st) = two_aircraft_day(false);
        let v0 = orch.build_initial(&st, &requests, Deadline::unbounded()).unwrap();
        assert_eq!(v0.slots.len(), 4);
        let on_a1: Vec<&str> = v0
            .slots
            .iter()
            .filter(|s| s.resource == ResourceRef::Aircraft("A1".to_string()))
            .map(|s| s.request_id.as_str())
            .collect();
        assert_eq!(on_a1, vec!["R1", "R2"]);

        let outcome = orch
            .apply_disruption(
                &mut st,
                &grounding("EV-GND", "A1", TimeWindow::day(week())),
                Deadline::unbounded(),
            )
            .unwrap();

        let v1 = outcome.version().unwrap();
        assert_eq!(v1.diff.removed, vec!["SLOT-R1", "SLOT-R2"]);
        assert!(v1.diff.reassigned.is_empty());
        assert_eq!(v1.churn, 0.5);
        assert!(v1.churn_exceeded);
        let unplaced: Vec<&str> = v1
            .unplaced
            .iter()
            .map(|u| u.request.request_id.as_str())
            .collect();
        assert_eq!(unplaced, vec!["R1", "R2"]);
        // A2 上的时段保持不动
        assert_eq!(v1.slot("SLOT-R3"), v0.slot("SLOT-R3"));
        assert_eq!(v1.slot("SLOT-R4"), v0.slot("SLOT-R4"));
    }

    #[test]
    fn test_grounding_with_spare_reassigns_to_matching_type() {
        let orch = orchestrator(EngineConfig::default());
        let (requests, mut st) = two_aircraft_day(true);
        orch.build_initial(&st, &requests, Deadline::unbounded()).unwrap();

        let outcome = orch
            .apply_disruption(
                &mut st,
                &grounding("EV-GND", "A1", TimeWindow::day(week())),
                Deadline::unbounded(),
            )
            .unwrap();

        let v1 = outcome.version().unwrap();
        assert_eq!(v1.diff.reassigned, vec!["SLOT-R1", "SLOT-R2"]);
        assert!(v1.unplaced.is_empty());
        for id in ["SLOT-R1", "SLOT-R2"] {
            assert_eq!(
                v1.slot(id).unwrap().resource,
                ResourceRef::Aircraft("A3".to_string())
            );
        }
        assert_eq!(v1.churn, 0.5);
    }

    // ==========================================
    // 场景3: 单飞签注过期
    // ==========================================

    #[test]
    fn test_lapsed_solo_endorsement_is_violation() {
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let p = pool(
            vec![solo_student("S1", 2, week() - Duration::days(120))],
            vec![],
            vec![aircraft("A1", "C172")],
            vec![],
        );
        let ctx = ValidationContext::new(&p, &config, &rules);
        let req = request("R1", "S1", SortieType::Solo, 2, 0, 8, 12, 60);
        let slot = Slot::from_request(
            &req,
            at(0, 8, 0),
            None,
            ResourceRef::Aircraft("A1".to_string()),
        );

        let outcome = ConstraintValidator::new().validate(&ctx, &slot, &[]);
        assert_eq!(outcome, ValidationOutcome::Violated(vec![RuleId::SoloEndorsement]));
    }

    #[test]
    fn test_scheduler_leaves_lapsed_solo_request_unplaced() {
        let orch = orchestrator(EngineConfig::default());
        let st = week_state(
            pool(
                vec![
                    solo_student("S1", 2, week() - Duration::days(120)),
                    solo_student("S2", 2, week() - Duration::days(30)),
                ],
                vec![instructor("I1")],
                vec![aircraft("A1", "C172")],
                vec![],
            ),
            None,
        );
        let requests = vec![
            request("R1", "S1", SortieType::Solo, 2, 0, 8, 12, 60),
            request("R2", "S2", SortieType::Solo, 2, 0, 8, 12, 60),
        ];

        let v0 = orch.build_initial(&st, &requests, Deadline::unbounded()).unwrap();
        assert_eq!(v0.slots.len(), 1);
        let placed = v0.slot("SLOT-R2").unwrap();
        assert_eq!(placed.instructor_id, None);

        assert_eq!(v0.unplaced.len(), 1);
        assert_eq!(v0.unplaced[0].request.request_id, "R1");
        assert_eq!(v0.unplaced[0].reason, RuleId::SoloEndorsement);
    }

    #[test]
    fn test_lapsed_instructor_currency_is_violation() {
        let config = EngineConfig::default();
        let rules = config.rule_set();
        let mut lapsed = instructor("I1");
        lapsed.currency_date = Some(week() - Duration::days(91));
        let p = pool(
            vec![student("S1", 1)],
            vec![lapsed],
            vec![aircraft("A1", "C172")],
            vec![],
        );
        let ctx = ValidationContext::new(&p, &config, &rules);
        let slot = Slot::from_request(
            &circuits("R1", "S1", 0, 8),
            at(0, 8, 0),
            Some("I1".to_string()),
            ResourceRef::Aircraft("A1".to_string()),
        );

        let outcome = ConstraintValidator::new().validate(&ctx, &slot, &[]);
        assert_eq!(outcome.first(), Some(RuleId::InstructorCurrency));
    }

    // ==========================================
    // 场景4: 两个请求争用同一机型
    // ==========================================

    fn contested(second_pa28: bool) -> (Vec<flight_roster::SortieRequest>, flight_roster::WeekState) {
        let mut fleet = vec![aircraft("A1", "C172"), aircraft("B1", "PA28")];
        if second_pa28 {
            fleet.push(aircraft("B2", "PA28"));
        }
        let st = week_state(
            pool(
                vec![student("S1", 1), student("S2", 1)],
                vec![instructor("I1"), instructor("I2")],
                fleet,
                vec![],
            ),
            None,
        );
        let mut nav = request("R-NAV", "S1", SortieType::Nav, 1, 0, 8, 9, 60);
        nav.aircraft_type = Some("PA28".to_string());
        let mut cct = circuits("R-CCT", "S2", 0, 8);
        cct.aircraft_type = Some("PA28".to_string());
        (vec![cct, nav], st)
    }

    #[test]
    fn test_contested_aircraft_goes_to_higher_priority_request() {
        let orch = orchestrator(EngineConfig::default());
        let (requests, st) = contested(false);
        let v0 = orch.build_initial(&st, &requests, Deadline::unbounded()).unwrap();

        assert_eq!(v0.slots.len(), 1);
        assert_eq!(v0.slots[0].request_id, "R-NAV");
        assert_eq!(v0.slots[0].resource, ResourceRef::Aircraft("B1".to_string()));
        assert_eq!(v0.unplaced.len(), 1);
        assert_eq!(v0.unplaced[0].request.request_id, "R-CCT");
        assert_eq!(v0.unplaced[0].reason, RuleId::BookingExclusivity);
    }

    #[test]
    fn test_contested_request_retries_other_aircraft() {
        let orch = orchestrator(EngineConfig::default());
        let (requests, st) = contested(true);
        let v0 = orch.build_initial(&st, &requests, Deadline::unbounded()).unwrap();

        assert!(v0.unplaced.is_empty());
        assert_eq!(
            v0.slot("SLOT-R-NAV").unwrap().resource,
            ResourceRef::Aircraft("B1".to_string())
        );
        assert_eq!(
            v0.slot("SLOT-R-CCT").unwrap().resource,
            ResourceRef::Aircraft("B2".to_string())
        );
    }

    // ==========================================
    // 场景5: 零扰动首版
    // ==========================================

    #[test]
    fn test_initial_version_has_zero_churn() {
        let orch = orchestrator(EngineConfig::default());
        let (requests, st) = two_aircraft_day(false);
        let v0 = orch.build_initial(&st, &requests, Deadline::unbounded()).unwrap();

        assert!(v0.is_initial());
        assert_eq!(v0.churn, 0.0);
        assert!(!v0.churn_exceeded);
        assert_eq!(v0.diff.added.len(), 4);
        assert_eq!(v0.disruption_id, None);
    }

    #[test]
    fn test_disruption_on_empty_roster_has_zero_churn() {
        let orch = orchestrator(EngineConfig::default());
        let mut st = week_state(
            pool(vec![student("S1", 1)], vec![instructor("I1")], vec![aircraft("A1", "C172")], vec![]),
            None,
        );
        let v0 = orch.build_initial(&st, &[], Deadline::unbounded()).unwrap();
        assert!(v0.slots.is_empty());
        assert_eq!(v0.churn, 0.0);

        let outcome = orch
            .apply_disruption(
                &mut st,
                &grounding("EV-1", "A1", TimeWindow::day(week())),
                Deadline::unbounded(),
            )
            .unwrap();
        let v1 = outcome.version().unwrap();
        assert_eq!(v1.churn, 0.0);
        assert!(!v1.churn.is_nan());
        assert!(v1.diff.is_empty());
    }
}
