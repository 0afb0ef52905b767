// ==========================================
// 飞行训练排班系统 - 排班运行指标
// ==========================================
// 职责: 由某周版本历史汇总运行指标 (只读, 无 I/O)
// - 重排次数与变更率统计 (平均/最大/最小)
// - 按类型统计扰动次数
// - 最新版本的放行覆盖情况
// 说明: 变更率统计只计入重排版本 (首版 churn 恒为 0, 不参与)
// ==========================================

use crate::domain::roster::RosterVersion;
use crate::domain::types::{DispatchOutcome, DisruptionKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 最新版本的放行覆盖
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetrics {
    pub total_slots: usize,
    pub go: usize,
    pub no_go: usize,
    pub sim_convert: usize,
    pub undecided: usize,
    pub needs_review: usize, // 未落位请求, 需人工处理
    pub coverage_rate: f64,  // GO 占比 (百分数), 无时段时为 0
    pub placement_rate: f64, // 已落位 / (已落位 + 未落位) (百分数)
}

impl CoverageMetrics {
    pub fn from_version(version: &RosterVersion) -> Self {
        let count = |outcome: Option<DispatchOutcome>| {
            version.slots.iter().filter(|s| s.outcome() == outcome).count()
        };
        let total_slots = version.slots.len();
        let go = count(Some(DispatchOutcome::Go));
        let needs_review = version.unplaced.len();
        Self {
            total_slots,
            go,
            no_go: count(Some(DispatchOutcome::NoGo)),
            sim_convert: count(Some(DispatchOutcome::SimConvert)),
            undecided: count(None),
            needs_review,
            coverage_rate: percent(go, total_slots),
            placement_rate: percent(total_slots, total_slots + needs_review),
        }
    }
}

/// 某周排班运行指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterMetrics {
    pub week_start: NaiveDate,
    pub latest_version_id: String,
    pub total_versions: usize,
    pub total_reallocations: usize,   // 首版之后的全部版本
    pub dispatch_recomputes: usize,   // 其中由气象重算产生的版本
    pub churn_exceeded_count: usize,
    pub avg_churn: f64,
    pub max_churn: f64,
    pub min_churn: f64,
    pub total_disruptions: usize,
    pub disruption_types: BTreeMap<DisruptionKind, usize>,
    pub coverage: CoverageMetrics,
}

impl RosterMetrics {
    /// 由版本历史 (seq 升序) 汇总
    ///
    /// # 返回
    /// - None: 历史为空 (该周尚未生成)
    pub fn from_history(history: &[RosterVersion]) -> Option<Self> {
        let latest = history.last()?;
        let replans: Vec<&RosterVersion> = history.iter().filter(|v| !v.is_initial()).collect();

        let churns: Vec<f64> = replans.iter().map(|v| v.churn).collect();
        let (avg_churn, max_churn, min_churn) = if churns.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                churns.iter().sum::<f64>() / churns.len() as f64,
                churns.iter().copied().fold(f64::MIN, f64::max),
                churns.iter().copied().fold(f64::MAX, f64::min),
            )
        };

        let mut disruption_types = BTreeMap::new();
        for kind in replans.iter().filter_map(|v| v.disruption_kind) {
            *disruption_types.entry(kind).or_insert(0) += 1;
        }

        Some(Self {
            week_start: latest.week_start,
            latest_version_id: latest.version_id(),
            total_versions: history.len(),
            total_reallocations: replans.len(),
            dispatch_recomputes: replans.iter().filter(|v| v.disruption_id.is_none()).count(),
            churn_exceeded_count: replans.iter().filter(|v| v.churn_exceeded).count(),
            avg_churn,
            max_churn,
            min_churn,
            total_disruptions: replans.iter().filter(|v| v.disruption_id.is_some()).count(),
            disruption_types,
            coverage: CoverageMetrics::from_version(latest),
        })
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
