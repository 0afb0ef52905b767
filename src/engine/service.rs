// ==========================================
// 飞行训练排班系统 - 排班服务 (并发外壳)
// ==========================================
// 职责: 为编排器提供 单周单写者 的异步入口
// - 每周一把 tokio Mutex (公平排队), 扰动按到达顺序串行处理
// - 不同周之间互不阻塞
// - 计算在 spawn_blocking 中执行, 截止时间自取得锁后开始计算
// - 放行重算的纯评估部分按块并行, 结果经同一提交路径落定
// ==========================================

use crate::domain::disruption::DisruptionEvent;
use crate::domain::roster::RosterVersion;
use crate::domain::sortie::{Slot, SortieRequest};
use crate::domain::weather::WeatherBoard;
use crate::engine::dispatch::{DispatchEvaluator, WeatherAssessment};
use crate::engine::orchestrator::{Deadline, ReplanOrchestrator, ReplanOutcome, WeekState};
use crate::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tokio::task::{spawn_blocking, JoinError};
use tracing::{debug, info};

type WeekHandle = Arc<Mutex<WeekState>>;

pub struct RosterService {
    orchestrator: Arc<ReplanOrchestrator>,
    weeks: StdMutex<HashMap<NaiveDate, WeekHandle>>,
}

impl RosterService {
    pub fn new(orchestrator: ReplanOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            weeks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn orchestrator(&self) -> &ReplanOrchestrator {
        &self.orchestrator
    }

    /// 已加载的排班周 (升序)
    pub fn loaded_weeks(&self) -> EngineResult<Vec<NaiveDate>> {
        let weeks = self.lock_weeks()?;
        let mut list: Vec<NaiveDate> = weeks.keys().copied().collect();
        list.sort();
        Ok(list)
    }

    /// 当前周工作状态的副本
    pub async fn week_state(&self, week_start: NaiveDate) -> EngineResult<Option<WeekState>> {
        match self.handle(week_start)? {
            Some(handle) => Ok(Some(handle.lock().await.clone())),
            None => Ok(None),
        }
    }

    /// 生成某周首个版本
    ///
    /// # 参数
    /// - state: 周工作状态
    /// - requests: 本周训练请求
    ///
    /// # 错误
    /// - Input: 该周已有版本
    /// - TimeoutExceeded: 超出 build_timeout_ms
    pub async fn generate_roster(
        &self,
        state: WeekState,
        requests: Vec<SortieRequest>,
    ) -> EngineResult<RosterVersion> {
        let handle = self.handle_or_insert(&state)?;
        let mut guard = handle.lock().await;

        let orchestrator = self.orchestrator.clone();
        let deadline = Deadline::after_ms(orchestrator.config().build_timeout_ms);
        let (state, result) = spawn_blocking(move || {
            let result = orchestrator.build_initial(&state, &requests, deadline);
            (state, result)
        })
        .await
        .map_err(join_error)?;

        let version = result?;
        *guard = state;
        Ok(version)
    }

    /// 启动/恢复: 登记周工作状态, 返回存储中的最新版本
    pub async fn load_week(&self, state: WeekState) -> EngineResult<Option<RosterVersion>> {
        let week_start = state.week_start;
        let handle = self.handle_or_insert(&state)?;
        {
            let mut guard = handle.lock().await;
            *guard = state;
        }
        let latest = self.orchestrator.latest(week_start)?;
        info!(
            week_start = %week_start,
            latest = ?latest.as_ref().map(|v| v.version_id()),
            "排班周已加载"
        );
        Ok(latest)
    }

    /// 处理扰动事件 (同一周串行)
    pub async fn apply_disruption(
        &self,
        week_start: NaiveDate,
        event: DisruptionEvent,
    ) -> EngineResult<ReplanOutcome> {
        let handle = self.require_handle(week_start)?;
        let mut guard = handle.lock_owned().await;
        debug!(week_start = %week_start, event_id = %event.event_id, "取得周写锁");

        let orchestrator = self.orchestrator.clone();
        let deadline = Deadline::after_ms(orchestrator.config().replan_timeout_ms);
        spawn_blocking(move || orchestrator.apply_disruption(&mut guard, &event, deadline))
            .await
            .map_err(join_error)?
    }

    /// 以新气象板重算放行结论
    ///
    /// 纯评估按 dispatch_parallel_chunk 分块并行, 结论落定与提交串行
    pub async fn recompute_dispatch(
        &self,
        week_start: NaiveDate,
        board: WeatherBoard,
    ) -> EngineResult<ReplanOutcome> {
        let handle = self.require_handle(week_start)?;
        let mut guard = handle.lock_owned().await;

        let config = self.orchestrator.config().clone();
        let deadline = Deadline::after_ms(config.replan_timeout_ms);
        let parent = self.orchestrator.latest(week_start)?.ok_or_else(|| {
            EngineError::Input(format!("排班周尚无已提交版本: {}", week_start))
        })?;

        let pool = Arc::new(guard.pool.clone());
        let shared_board = Arc::new(board.clone());
        let minima = Arc::new(config.minima.clone());
        let chunks: Vec<Vec<Slot>> = parent
            .slots
            .chunks(config.dispatch_parallel_chunk.max(1))
            .map(<[Slot]>::to_vec)
            .collect();
        let chunk_count = chunks.len();

        let tasks = chunks.into_iter().map(|chunk| {
            let pool = pool.clone();
            let board = shared_board.clone();
            let minima = minima.clone();
            spawn_blocking(move || {
                DispatchEvaluator::new().assess_all(&chunk, &pool, &board, &minima)
            })
        });

        let mut assessments: BTreeMap<String, WeatherAssessment> = BTreeMap::new();
        for part in join_all(tasks).await {
            assessments.extend(part.map_err(join_error)?);
        }
        debug!(
            slots = assessments.len(),
            chunks = chunk_count,
            "放行纯评估完成"
        );

        let orchestrator = self.orchestrator.clone();
        spawn_blocking(move || {
            orchestrator.recompute_dispatch(&mut guard, board, Some(&assessments), deadline)
        })
        .await
        .map_err(join_error)?
    }

    // ==========================================
    // 周状态表
    // ==========================================

    fn lock_weeks(
        &self,
    ) -> EngineResult<std::sync::MutexGuard<'_, HashMap<NaiveDate, WeekHandle>>> {
        self.weeks
            .lock()
            .map_err(|e| EngineError::Other(anyhow::anyhow!("周状态表锁失败: {}", e)))
    }

    fn handle(&self, week_start: NaiveDate) -> EngineResult<Option<WeekHandle>> {
        Ok(self.lock_weeks()?.get(&week_start).cloned())
    }

    fn require_handle(&self, week_start: NaiveDate) -> EngineResult<WeekHandle> {
        self.handle(week_start)?
            .ok_or_else(|| EngineError::Input(format!("排班周未加载: {}", week_start)))
    }

    fn handle_or_insert(&self, state: &WeekState) -> EngineResult<WeekHandle> {
        let mut weeks = self.lock_weeks()?;
        Ok(weeks
            .entry(state.week_start)
            .or_insert_with(|| Arc::new(Mutex::new(state.clone())))
            .clone())
    }
}

fn join_error(err: JoinError) -> EngineError {
    EngineError::Other(anyhow::anyhow!("后台计算任务失败: {}", err))
}
