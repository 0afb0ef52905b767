// ==========================================
// 飞行训练排班系统 - 排班版本领域模型
// ==========================================
// 依据: 版本链 - RosterVersion / RosterDiff
// 红线: 每周线性版本链, 只追加不修改
// 红线: diff 必须可由 父版本 + 当前快照 完整重建
// ==========================================

use crate::domain::sortie::{Slot, UnplacedRequest};
use crate::domain::types::DisruptionKind;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// RosterDiff - 相对父版本的变更
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RosterDiff {
    pub added: Vec<String>,        // 新增时段
    pub removed: Vec<String>,      // 移除时段 (含未能重排)
    pub reassigned: Vec<String>,   // 时间/人员/资源变更
    pub redispatched: Vec<String>, // 仅放行结论变更
}

impl RosterDiff {
    /// 由父/子快照计算差异 (结果按 slot_id 升序)
    pub fn between(parent: &[Slot], child: &[Slot]) -> Self {
        let parent_map: BTreeMap<&str, &Slot> =
            parent.iter().map(|s| (s.slot_id.as_str(), s)).collect();
        let child_map: BTreeMap<&str, &Slot> =
            child.iter().map(|s| (s.slot_id.as_str(), s)).collect();

        let mut diff = RosterDiff::default();

        for (id, child_slot) in &child_map {
            match parent_map.get(id) {
                None => diff.added.push(id.to_string()),
                Some(parent_slot) => {
                    if !parent_slot.same_assignment(child_slot) {
                        diff.reassigned.push(id.to_string());
                    } else if parent_slot.dispatch != child_slot.dispatch
                        || parent_slot.converted_from != child_slot.converted_from
                    {
                        diff.redispatched.push(id.to_string());
                    }
                }
            }
        }

        for id in parent_map.keys() {
            if !child_map.contains_key(id) {
                diff.removed.push(id.to_string());
            }
        }

        diff
    }

    /// 分配发生变化的时段数 (计入 churn)
    pub fn changed_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.reassigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changed_count() == 0 && self.redispatched.is_empty()
    }
}

// ==========================================
// RosterVersion - 排班版本
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterVersion {
    pub week_start: NaiveDate,              // 排班周 (周一)
    pub seq: u32,                           // 版本序号 (从 0 单调递增)
    pub parent_seq: Option<u32>,            // 父版本 (首版为空)
    pub slots: Vec<Slot>,                   // 完整快照 (按 slot_id 升序)
    pub diff: RosterDiff,                   // 相对父版本差异
    pub disruption_id: Option<String>,      // 触发扰动 (首版为空)
    #[serde(default)]
    pub disruption_kind: Option<DisruptionKind>,
    pub churn: f64,                         // 变更率
    pub churn_exceeded: bool,               // 超出变更率目标
    #[serde(default)]
    pub unplaced: Vec<UnplacedRequest>,     // 需人工处理的请求
    pub committed_at: NaiveDateTime,        // 提交时间
}

impl RosterVersion {
    /// 版本标识 (周 + 序号)
    pub fn version_id(&self) -> String {
        format!("{}-v{}", self.week_start.format("%Y-%m-%d"), self.seq)
    }

    pub fn is_initial(&self) -> bool {
        self.parent_seq.is_none()
    }

    pub fn slot(&self, slot_id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.slot_id == slot_id)
    }
}
