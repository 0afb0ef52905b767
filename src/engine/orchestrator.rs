// ==========================================
// 飞行训练排班系统 - 扰动重排编排器
// ==========================================
// 用途: 协调 影响评估 / 贪心排班 / 放行评估 / 约束校验 / 版本提交
// 状态机: ASSESS → GENERATE → VALIDATE → COMMIT → {COMMITTED | REJECTED}
// - 变更率超出目标: COMMIT → GENERATE 以一跳扩展范围重试一次
// - 每次状态迁移前检查截止时间, 超时即 REJECTED
// 红线: 被拒绝的重排不改变最新版本, 也不改变周工作状态
// 红线: 未受影响的时段保持原样 (重排只触及受影响集合)
// ==========================================

use crate::config::{ChurnPolicy, EngineConfig};
use crate::domain::disruption::DisruptionEvent;
use crate::domain::resource::ResourcePool;
use crate::domain::roster::{RosterDiff, RosterVersion};
use crate::domain::rule::RuleSet;
use crate::domain::sortie::{Slot, SortieRequest, UnplacedRequest};
use crate::domain::types::{DisruptionKind, TimeWindow};
use crate::domain::weather::WeatherBoard;
use crate::engine::churn::{ChurnCalculator, ChurnReport};
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::dispatch::{DispatchEvaluator, WeatherAssessment};
use crate::engine::events::{
    OptionalEventPublisher, RosterEvent, RosterEventPublisher, RosterEventType,
};
use crate::engine::impact::{apply_event, ImpactAssessor};
use crate::engine::scheduler::GreedyScheduler;
use crate::engine::validator::{
    ConstraintValidator, RosterValidation, SlotViolation, ValidationContext,
};
use crate::error::{EngineError, EngineResult};
use crate::repository::roster_store::RosterVersionStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

// ==========================================
// WeekState - 单周工作状态
// ==========================================
// 资源池与气象板只在版本提交时更新
#[derive(Debug, Clone, PartialEq)]
pub struct WeekState {
    pub week_start: NaiveDate,
    pub pool: ResourcePool,
    pub weather: Option<WeatherBoard>,
}

impl WeekState {
    pub fn new(week_start: NaiveDate, pool: ResourcePool, weather: Option<WeatherBoard>) -> Self {
        Self {
            week_start,
            pool,
            weather,
        }
    }
}

// ==========================================
// Deadline - 计算截止时间
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
    budget_ms: u64,
}

impl Deadline {
    pub fn after_ms(budget_ms: u64) -> Self {
        Self {
            at: Instant::now().checked_add(Duration::from_millis(budget_ms)),
            budget_ms,
        }
    }

    /// 不限时 (离线批处理 / 测试)
    pub fn unbounded() -> Self {
        Self {
            at: None,
            budget_ms: 0,
        }
    }

    pub fn expired(&self) -> bool {
        self.at.map(|at| Instant::now() >= at).unwrap_or(false)
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget_ms
    }
}

// ==========================================
// 状态机定义
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplanState {
    Assess,
    Generate,
    Validate,
    Commit,
    Committed,
    Rejected,
}

impl fmt::Display for ReplanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReplanState::Assess => "ASSESS",
            ReplanState::Generate => "GENERATE",
            ReplanState::Validate => "VALIDATE",
            ReplanState::Commit => "COMMIT",
            ReplanState::Committed => "COMMITTED",
            ReplanState::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

/// 拒绝原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// 结果快照违反硬约束
    ConstraintViolation { violations: Vec<SlotViolation> },
    /// 变更率超出目标且策略为拒绝
    ChurnExceeded { churn: f64, target: f64 },
    /// 超出计算时限 (state 为未能进入的状态)
    TimeoutExceeded { state: ReplanState, budget_ms: u64 },
}

/// 重排结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplanOutcome {
    Committed {
        version: RosterVersion,
        transitions: Vec<ReplanState>,
    },
    Rejected {
        reason: RejectReason,
        transitions: Vec<ReplanState>,
    },
}

impl ReplanOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ReplanOutcome::Committed { .. })
    }

    pub fn version(&self) -> Option<&RosterVersion> {
        match self {
            ReplanOutcome::Committed { version, .. } => Some(version),
            ReplanOutcome::Rejected { .. } => None,
        }
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            ReplanOutcome::Committed { .. } => None,
            ReplanOutcome::Rejected { reason, .. } => Some(reason),
        }
    }

    pub fn transitions(&self) -> &[ReplanState] {
        match self {
            ReplanOutcome::Committed { transitions, .. }
            | ReplanOutcome::Rejected { transitions, .. } => transitions,
        }
    }
}

/// 状态迁移记录 + 截止时间检查
struct ReplanMachine {
    trail: Vec<ReplanState>,
    deadline: Deadline,
}

impl ReplanMachine {
    fn new(deadline: Deadline) -> Self {
        Self {
            trail: Vec::new(),
            deadline,
        }
    }

    fn enter(&mut self, state: ReplanState) -> Result<(), RejectReason> {
        if self.deadline.expired() {
            return Err(RejectReason::TimeoutExceeded {
                state,
                budget_ms: self.deadline.budget_ms(),
            });
        }
        debug!(state = %state, "重排状态迁移");
        self.trail.push(state);
        Ok(())
    }

    fn committed(mut self, version: RosterVersion) -> ReplanOutcome {
        self.trail.push(ReplanState::Committed);
        ReplanOutcome::Committed {
            version,
            transitions: self.trail,
        }
    }

    fn rejected(mut self, reason: RejectReason) -> ReplanOutcome {
        self.trail.push(ReplanState::Rejected);
        ReplanOutcome::Rejected {
            reason,
            transitions: self.trail,
        }
    }
}

/// 周期内部错误: 可恢复拒绝 vs 硬错误
enum CycleError {
    Reject(RejectReason),
    Engine(EngineError),
}

impl From<RejectReason> for CycleError {
    fn from(reason: RejectReason) -> Self {
        CycleError::Reject(reason)
    }
}

impl From<EngineError> for CycleError {
    fn from(err: EngineError) -> Self {
        CycleError::Engine(err)
    }
}

/// 一次 GENERATE 的候选结果
struct Candidate {
    slots: Vec<Slot>,
    unplaced: Vec<UnplacedRequest>,
    diff: RosterDiff,
    churn: ChurnReport,
}

/// 通过校验、待提交的结果 (含新的资源状态)
struct Prepared {
    candidate: Candidate,
    pool: ResourcePool,
    weather: Option<WeatherBoard>,
}

// ==========================================
// ReplanOrchestrator - 重排编排器
// ==========================================
pub struct ReplanOrchestrator {
    store: Arc<dyn RosterVersionStore>,
    config: EngineConfig,
    rules: RuleSet,
    clock: Arc<dyn Clock>,
    publisher: OptionalEventPublisher,
    scheduler: GreedyScheduler,
    dispatcher: DispatchEvaluator,
    validator: ConstraintValidator,
    impact: ImpactAssessor,
    churn: ChurnCalculator,
}

impl ReplanOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// - store: 版本存储
    /// - config: 引擎配置 (规则集由配置派生)
    pub fn new(store: Arc<dyn RosterVersionStore>, config: EngineConfig) -> Self {
        Self {
            rules: config.rule_set(),
            store,
            config,
            clock: Arc::new(SystemClock),
            publisher: OptionalEventPublisher::none(),
            scheduler: GreedyScheduler::new(),
            dispatcher: DispatchEvaluator::new(),
            validator: ConstraintValidator::new(),
            impact: ImpactAssessor::new(),
            churn: ChurnCalculator::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn RosterEventPublisher>) -> Self {
        self.publisher = OptionalEventPublisher::with_publisher(publisher);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RosterVersionStore> {
        &self.store
    }

    /// 某周最新已提交版本
    pub fn latest(&self, week_start: NaiveDate) -> EngineResult<Option<RosterVersion>> {
        Ok(self.store.latest(week_start)?)
    }

    // ==========================================
    // 初始构建
    // ==========================================

    /// 生成某周的首个版本 (seq=0)
    ///
    /// # 参数
    /// - state: 周工作状态 (资源池 + 可选气象板)
    /// - requests: 本周训练请求
    /// - deadline: 截止时间
    ///
    /// # 返回
    /// 已提交的版本; 无法落位的请求记录在 unplaced 中
    ///
    /// # 错误
    /// - Input: 该周已有版本
    /// - ConstraintViolation: 结果快照未通过整体校验
    /// - TimeoutExceeded: 超出时限, 不提交
    #[instrument(skip_all, fields(week_start = %state.week_start, requests = requests.len()))]
    pub fn build_initial(
        &self,
        state: &WeekState,
        requests: &[SortieRequest],
        deadline: Deadline,
    ) -> EngineResult<RosterVersion> {
        if let Some(existing) = self.store.latest(state.week_start)? {
            return Err(EngineError::Input(format!(
                "排班周已有版本: {}",
                existing.version_id()
            )));
        }

        let timeout = || EngineError::TimeoutExceeded {
            operation: "build_initial".to_string(),
            budget_ms: deadline.budget_ms(),
        };

        let ctx = ValidationContext::new(&state.pool, &self.config, &self.rules)
            .with_weather(state.weather.as_ref());
        let horizon = TimeWindow::week(state.week_start);
        let outcome = self.scheduler.schedule(&ctx, requests, &[], Some(horizon));
        if deadline.expired() {
            return Err(timeout());
        }

        let mut slots = outcome.placed;
        if let Some(board) = state.weather.as_ref() {
            let ids: Vec<String> = slots.iter().map(|s| s.slot_id.clone()).collect();
            slots = self.dispatch_slots(&ctx, board, slots, &ids, None);
        }
        sort_slots(&mut slots);

        if let RosterValidation::Violated(violations) = self.validator.validate_all(&ctx, &slots) {
            warn!(violations = violations.len(), "初始排班未通过整体校验");
            return Err(EngineError::ConstraintViolation(violations));
        }
        if deadline.expired() {
            return Err(timeout());
        }

        let version = RosterVersion {
            week_start: state.week_start,
            seq: 0,
            parent_seq: None,
            diff: RosterDiff::between(&[], &slots),
            slots,
            disruption_id: None,
            disruption_kind: None,
            churn: 0.0,
            churn_exceeded: false,
            unplaced: merge_unplaced(&[], outcome.unplaced),
            committed_at: self.clock.now(),
        };
        self.store.append(&version)?;

        info!(
            version_id = %version.version_id(),
            slots = version.slots.len(),
            unplaced = version.unplaced.len(),
            "初始排班版本已提交"
        );
        self.publish(&version, RosterEventType::VersionCommitted);
        Ok(version)
    }

    // ==========================================
    // 扰动重排
    // ==========================================

    /// 处理一个扰动事件
    ///
    /// # 参数
    /// - state: 周工作状态 (仅在提交时更新)
    /// - event: 扰动事件
    /// - deadline: 截止时间
    ///
    /// # 返回
    /// COMMITTED (新版本) 或 REJECTED (原因), 两者都附带状态迁移轨迹
    ///
    /// # 错误
    /// - Input: 事件格式错误 / 该周尚无版本
    /// - DisruptionInconsistency: 事件已处理 / 引用未知资源
    #[instrument(skip_all, fields(week_start = %state.week_start, event_id = %event.event_id, kind = %event.kind))]
    pub fn apply_disruption(
        &self,
        state: &mut WeekState,
        event: &DisruptionEvent,
        deadline: Deadline,
    ) -> EngineResult<ReplanOutcome> {
        if !event.is_well_formed() {
            return Err(EngineError::Input(format!(
                "扰动事件格式错误: event_id={}",
                event.event_id
            )));
        }
        let parent = self.require_latest(state.week_start)?;
        if self
            .store
            .contains_disruption(state.week_start, &event.event_id)?
        {
            return Err(EngineError::DisruptionInconsistency {
                event_id: event.event_id.clone(),
                message: "事件已处理".to_string(),
            });
        }

        let mut machine = ReplanMachine::new(deadline);
        match self.replan_cycle(&mut machine, state, &parent, event) {
            Ok(prepared) => {
                let version = self.commit(
                    &parent,
                    prepared.candidate,
                    Some(event),
                    RosterEventType::VersionCommitted,
                )?;
                state.pool = prepared.pool;
                state.weather = prepared.weather;
                Ok(machine.committed(version))
            }
            Err(CycleError::Reject(reason)) => Ok(self.reject(machine, &parent, reason)),
            Err(CycleError::Engine(err)) => {
                warn!(error = %err, "扰动处理失败");
                Err(err)
            }
        }
    }

    fn replan_cycle(
        &self,
        machine: &mut ReplanMachine,
        state: &WeekState,
        parent: &RosterVersion,
        event: &DisruptionEvent,
    ) -> Result<Prepared, CycleError> {
        // ASSESS
        machine.enter(ReplanState::Assess)?;
        let (pool, weather) = apply_event(event, &state.pool, state.weather.as_ref())?;
        let ctx =
            ValidationContext::new(&pool, &self.config, &self.rules).with_weather(weather.as_ref());
        let affected = self.impact.assess(&ctx, event, &parent.slots);
        info!(affected = affected.len(), total = parent.slots.len(), "扰动影响评估完成");

        // GENERATE
        machine.enter(ReplanState::Generate)?;
        let candidate = self.generate(&ctx, event.kind, parent, &affected);

        // VALIDATE
        machine.enter(ReplanState::Validate)?;
        if let RosterValidation::Violated(violations) =
            self.validator.validate_all(&ctx, &candidate.slots)
        {
            return Err(RejectReason::ConstraintViolation { violations }.into());
        }

        // COMMIT
        machine.enter(ReplanState::Commit)?;
        let target = self.config.churn_target;
        let mut chosen = candidate;
        if chosen.churn.exceeds(target) {
            let expanded = self.impact.expand_one_hop(&parent.slots, &affected);
            if expanded.len() > affected.len() {
                info!(
                    churn = chosen.churn.churn,
                    target,
                    expanded = expanded.len(),
                    "变更率超出目标, 扩大范围重试"
                );
                machine.enter(ReplanState::Generate)?;
                let retry = self.generate(&ctx, event.kind, parent, &expanded);
                machine.enter(ReplanState::Validate)?;
                let retry_ok = self.validator.validate_all(&ctx, &retry.slots).is_ok();
                machine.enter(ReplanState::Commit)?;
                if retry_ok && retry.churn.churn < chosen.churn.churn {
                    chosen = retry;
                }
            }
        }

        self.check_churn_policy(&chosen)?;
        Ok(Prepared {
            candidate: chosen,
            pool,
            weather,
        })
    }

    /// GENERATE: 在给定范围内重排 (WEATHER 为重新放行)
    fn generate(
        &self,
        ctx: &ValidationContext<'_>,
        kind: DisruptionKind,
        parent: &RosterVersion,
        scope: &BTreeSet<String>,
    ) -> Candidate {
        let (mut slots, fresh_unplaced) = if kind == DisruptionKind::Weather {
            let ids: Vec<String> = parent
                .slots
                .iter()
                .filter(|s| scope.contains(&s.slot_id))
                .map(|s| s.slot_id.clone())
                .collect();
            let slots = match ctx.weather {
                Some(board) => self.dispatch_slots(ctx, board, parent.slots.clone(), &ids, None),
                None => parent.slots.clone(),
            };
            (slots, Vec::new())
        } else {
            let (held, moved): (Vec<Slot>, Vec<Slot>) = parent
                .slots
                .iter()
                .cloned()
                .partition(|s| !scope.contains(&s.slot_id));
            let requests: Vec<SortieRequest> = moved.iter().map(Slot::to_request).collect();
            let horizon = TimeWindow::week(parent.week_start);
            let outcome = self.scheduler.schedule(ctx, &requests, &held, Some(horizon));

            let placed_ids: Vec<String> =
                outcome.placed.iter().map(|s| s.slot_id.clone()).collect();
            let mut slots = held;
            slots.extend(outcome.placed);
            if let Some(board) = ctx.weather {
                slots = self.dispatch_slots(ctx, board, slots, &placed_ids, None);
            }
            (slots, outcome.unplaced)
        };

        sort_slots(&mut slots);
        let diff = RosterDiff::between(&parent.slots, &slots);
        let churn = self.churn.compute(&parent.slots, &diff);
        debug!(
            scope = scope.len(),
            changed = churn.changed,
            churn = churn.churn,
            "重排候选已生成"
        );
        Candidate {
            slots,
            unplaced: merge_unplaced(&parent.unplaced, fresh_unplaced),
            diff,
            churn,
        }
    }

    // ==========================================
    // 放行结论重算
    // ==========================================

    /// 以新的气象板重算全部时段的放行结论
    ///
    /// # 参数
    /// - state: 周工作状态 (提交后气象板替换为 board)
    /// - board: 新气象板
    /// - assessments: 预先并行算好的纯评估 (按 slot_id); 缺失的项在此补算
    /// - deadline: 截止时间
    #[instrument(skip_all, fields(week_start = %state.week_start))]
    pub fn recompute_dispatch(
        &self,
        state: &mut WeekState,
        board: WeatherBoard,
        assessments: Option<&BTreeMap<String, WeatherAssessment>>,
        deadline: Deadline,
    ) -> EngineResult<ReplanOutcome> {
        let parent = self.require_latest(state.week_start)?;
        let mut machine = ReplanMachine::new(deadline);

        let result = (|| -> Result<Candidate, CycleError> {
            machine.enter(ReplanState::Assess)?;
            let ctx = ValidationContext::new(&state.pool, &self.config, &self.rules)
                .with_weather(Some(&board));
            let ids: Vec<String> = parent.slots.iter().map(|s| s.slot_id.clone()).collect();

            machine.enter(ReplanState::Generate)?;
            let mut slots =
                self.dispatch_slots(&ctx, &board, parent.slots.clone(), &ids, assessments);
            sort_slots(&mut slots);
            let diff = RosterDiff::between(&parent.slots, &slots);
            let churn = self.churn.compute(&parent.slots, &diff);
            let candidate = Candidate {
                slots,
                unplaced: parent.unplaced.clone(),
                diff,
                churn,
            };

            machine.enter(ReplanState::Validate)?;
            if let RosterValidation::Violated(violations) =
                self.validator.validate_all(&ctx, &candidate.slots)
            {
                return Err(RejectReason::ConstraintViolation { violations }.into());
            }

            machine.enter(ReplanState::Commit)?;
            self.check_churn_policy(&candidate)?;
            Ok(candidate)
        })();

        match result {
            Ok(candidate) => {
                let version =
                    self.commit(&parent, candidate, None, RosterEventType::DispatchRecomputed)?;
                state.weather = Some(board);
                Ok(machine.committed(version))
            }
            Err(CycleError::Reject(reason)) => Ok(self.reject(machine, &parent, reason)),
            Err(CycleError::Engine(err)) => Err(err),
        }
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn require_latest(&self, week_start: NaiveDate) -> EngineResult<RosterVersion> {
        self.store.latest(week_start)?.ok_or_else(|| {
            EngineError::Input(format!("排班周尚无已提交版本: {}", week_start))
        })
    }

    /// 按给定顺序逐个落定放行结论 (每次在最新快照上查找模拟机)
    fn dispatch_slots(
        &self,
        ctx: &ValidationContext<'_>,
        board: &WeatherBoard,
        mut slots: Vec<Slot>,
        ids: &[String],
        precomputed: Option<&BTreeMap<String, WeatherAssessment>>,
    ) -> Vec<Slot> {
        for id in ids {
            let Some(idx) = slots.iter().position(|s| &s.slot_id == id) else {
                continue;
            };
            let assessment = match precomputed.and_then(|m| m.get(id)) {
                Some(a) => a.clone(),
                None => self
                    .dispatcher
                    .assess(&slots[idx], ctx.pool, board, &ctx.config.minima),
            };
            let resolved = self
                .dispatcher
                .resolve(ctx, &slots[idx], &assessment, &slots);
            slots[idx] = resolved;
        }
        slots
    }

    fn check_churn_policy(&self, candidate: &Candidate) -> Result<(), RejectReason> {
        let target = self.config.churn_target;
        if candidate.churn.exceeds(target) && self.config.churn_policy == ChurnPolicy::FailClosed {
            return Err(RejectReason::ChurnExceeded {
                churn: candidate.churn.churn,
                target,
            });
        }
        Ok(())
    }

    fn commit(
        &self,
        parent: &RosterVersion,
        candidate: Candidate,
        disruption: Option<&DisruptionEvent>,
        event_type: RosterEventType,
    ) -> EngineResult<RosterVersion> {
        let churn_exceeded = candidate.churn.exceeds(self.config.churn_target);
        let version = RosterVersion {
            week_start: parent.week_start,
            seq: parent.seq + 1,
            parent_seq: Some(parent.seq),
            slots: candidate.slots,
            diff: candidate.diff,
            disruption_id: disruption.map(|e| e.event_id.clone()),
            disruption_kind: disruption.map(|e| e.kind),
            churn: candidate.churn.churn,
            churn_exceeded,
            unplaced: candidate.unplaced,
            committed_at: self.clock.now(),
        };
        self.store.append(&version)?;

        if churn_exceeded {
            warn!(
                version_id = %version.version_id(),
                churn = version.churn,
                target = self.config.churn_target,
                "版本已提交, 变更率超出目标"
            );
        } else {
            info!(
                version_id = %version.version_id(),
                churn = version.churn,
                changed = candidate.churn.changed,
                "版本已提交"
            );
        }
        self.publish(&version, event_type);
        Ok(version)
    }

    fn reject(
        &self,
        machine: ReplanMachine,
        parent: &RosterVersion,
        reason: RejectReason,
    ) -> ReplanOutcome {
        warn!(parent = %parent.version_id(), reason = ?reason, "重排被拒绝, 保留原版本");
        self.publisher.publish(RosterEvent::new(
            parent.week_start,
            parent.version_id(),
            RosterEventType::ReplanRejected,
            None,
        ));
        machine.rejected(reason)
    }

    fn publish(&self, version: &RosterVersion, event_type: RosterEventType) {
        self.publisher.publish(RosterEvent::new(
            version.week_start,
            version.version_id(),
            event_type,
            version.disruption_id.clone(),
        ));
    }
}

/// 快照按 slot_id 排序
fn sort_slots(slots: &mut [Slot]) {
    slots.sort_by(|a, b| a.slot_id.cmp(&b.slot_id));
}

/// 合并未落位请求: 保留父版本已有项, 追加新的 (按 request_id 去重)
fn merge_unplaced(carried: &[UnplacedRequest], fresh: Vec<UnplacedRequest>) -> Vec<UnplacedRequest> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut merged = Vec::with_capacity(carried.len() + fresh.len());
    for entry in carried.iter().cloned().chain(fresh) {
        if seen.insert(entry.request.request_id.clone()) {
            merged.push(entry);
        }
    }
    merged
}
