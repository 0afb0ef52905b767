// ==========================================
// 飞行训练排班系统 - 排班 API
// ==========================================
// 职责: 对外请求/响应入口, 与核心操作一一对应
// - generate_roster    → 生成某周首个版本
// - recompute_dispatch → 以新气象重算放行结论
// - apply_disruption   → 处理扰动事件
// 另提供 版本查询 / 运行指标 / 数据包回放 (CLI 使用)
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::disruption::DisruptionEvent;
use crate::domain::roster::RosterVersion;
use crate::domain::types::DispatchOutcome;
use crate::domain::weather::WeatherBoard;
use crate::engine::metrics::RosterMetrics;
use crate::engine::orchestrator::{RejectReason, ReplanOutcome, ReplanState};
use crate::engine::service::RosterService;
use crate::importer::RosterBundle;

// ==========================================
// 响应 DTO
// ==========================================

/// 版本摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterSummary {
    pub version_id: String,
    pub week_start: NaiveDate,
    pub seq: u32,
    pub parent_seq: Option<u32>,
    pub disruption_id: Option<String>,
    pub slots: usize,
    pub unplaced: usize,
    pub churn: f64,
    pub churn_exceeded: bool,
    pub go: usize,
    pub no_go: usize,
    pub sim_convert: usize,
    pub undecided: usize, // 尚无放行结论 (未加载气象)
}

impl RosterSummary {
    pub fn from_version(version: &RosterVersion) -> Self {
        let count = |outcome: Option<DispatchOutcome>| {
            version.slots.iter().filter(|s| s.outcome() == outcome).count()
        };
        Self {
            version_id: version.version_id(),
            week_start: version.week_start,
            seq: version.seq,
            parent_seq: version.parent_seq,
            disruption_id: version.disruption_id.clone(),
            slots: version.slots.len(),
            unplaced: version.unplaced.len(),
            churn: version.churn,
            churn_exceeded: version.churn_exceeded,
            go: count(Some(DispatchOutcome::Go)),
            no_go: count(Some(DispatchOutcome::NoGo)),
            sim_convert: count(Some(DispatchOutcome::SimConvert)),
            undecided: count(None),
        }
    }
}

/// 单个扰动的处理摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplanSummary {
    pub event_id: String,
    pub state: Option<ReplanState>, // COMMITTED / REJECTED; 硬错误时为空
    pub version: Option<RosterSummary>,
    pub reject_reason: Option<RejectReason>,
    pub transitions: Vec<ReplanState>,
    pub error: Option<String>,
}

impl ReplanSummary {
    fn from_outcome(event_id: &str, outcome: &ReplanOutcome) -> Self {
        Self {
            event_id: event_id.to_string(),
            state: outcome.transitions().last().copied(),
            version: outcome.version().map(RosterSummary::from_version),
            reject_reason: outcome.reject_reason().cloned(),
            transitions: outcome.transitions().to_vec(),
            error: None,
        }
    }

    fn from_error(event_id: &str, err: &ApiError) -> Self {
        Self {
            event_id: event_id.to_string(),
            state: None,
            version: None,
            reject_reason: None,
            transitions: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

/// 数据包回放报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRunReport {
    pub initial: RosterSummary,
    pub replans: Vec<ReplanSummary>,
    pub latest: RosterSummary,
    pub metrics: RosterMetrics,
}

// ==========================================
// RosterApi - 排班 API
// ==========================================
pub struct RosterApi {
    service: Arc<RosterService>,
}

impl RosterApi {
    pub fn new(service: Arc<RosterService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<RosterService> {
        &self.service
    }

    /// 生成某周排班
    ///
    /// # 参数
    /// - bundle: 周数据包 (资源 + 请求 + 可选气象)
    ///
    /// # 返回
    /// - Ok(RosterVersion): 首个版本 (seq=0)
    /// - Err(ApiError): 输入错误 / 已有版本 / 超时
    pub async fn generate_roster(&self, bundle: &RosterBundle) -> ApiResult<RosterVersion> {
        bundle.validate()?;
        let version = self
            .service
            .generate_roster(bundle.week_state(), bundle.requests.clone())
            .await?;
        Ok(version)
    }

    /// 启动/恢复: 登记周数据, 返回存储中的最新版本
    pub async fn load_week(&self, bundle: &RosterBundle) -> ApiResult<Option<RosterVersion>> {
        bundle.validate()?;
        Ok(self.service.load_week(bundle.week_state()).await?)
    }

    /// 以新气象板重算放行结论
    pub async fn recompute_dispatch(
        &self,
        week_start: NaiveDate,
        board: WeatherBoard,
    ) -> ApiResult<ReplanOutcome> {
        if board.observations.iter().any(|o| !o.window.is_valid()) {
            return Err(ApiError::InvalidInput("气象观测窗口无效".to_string()));
        }
        Ok(self.service.recompute_dispatch(week_start, board).await?)
    }

    /// 处理扰动事件
    pub async fn apply_disruption(
        &self,
        week_start: NaiveDate,
        event: DisruptionEvent,
    ) -> ApiResult<ReplanOutcome> {
        Ok(self.service.apply_disruption(week_start, event).await?)
    }

    /// 最新已提交版本
    pub fn get_latest_version(&self, week_start: NaiveDate) -> ApiResult<RosterVersion> {
        self.service
            .orchestrator()
            .latest(week_start)?
            .ok_or_else(|| ApiError::NotFound(format!("排班周{}尚无版本", week_start)))
    }

    /// 全部版本 (seq 升序)
    pub fn list_versions(&self, week_start: NaiveDate) -> ApiResult<Vec<RosterVersion>> {
        Ok(self.service.orchestrator().store().history(week_start)?)
    }

    /// 某周运行指标 (变更率 / 扰动类型 / 放行覆盖)
    pub fn metrics(&self, week_start: NaiveDate) -> ApiResult<RosterMetrics> {
        let history = self.list_versions(week_start)?;
        RosterMetrics::from_history(&history)
            .ok_or_else(|| ApiError::NotFound(format!("排班周{}尚无版本", week_start)))
    }

    /// 回放数据包: 生成 (或恢复) 首版, 再按顺序处理包内扰动
    ///
    /// 单个扰动的硬错误只记录在报告中, 后续扰动继续处理
    pub async fn run_bundle(&self, bundle: &RosterBundle) -> ApiResult<BundleRunReport> {
        let initial = match self.load_week(bundle).await? {
            Some(existing) => {
                tracing::info!(version_id = %existing.version_id(), "沿用已存在的排班版本");
                existing
            }
            None => self.generate_roster(bundle).await?,
        };

        let mut replans = Vec::with_capacity(bundle.disruptions.len());
        for event in &bundle.disruptions {
            let event_id = event.event_id.clone();
            match self.apply_disruption(bundle.week_start, event.clone()).await {
                Ok(outcome) => replans.push(ReplanSummary::from_outcome(&event_id, &outcome)),
                Err(err) => {
                    tracing::warn!(event_id = %event_id, error = %err, "扰动处理失败, 跳过");
                    replans.push(ReplanSummary::from_error(&event_id, &err));
                }
            }
        }

        let latest = self.get_latest_version(bundle.week_start)?;
        let metrics = self.metrics(bundle.week_start)?;
        Ok(BundleRunReport {
            initial: RosterSummary::from_version(&initial),
            replans,
            latest: RosterSummary::from_version(&latest),
            metrics,
        })
    }
}
