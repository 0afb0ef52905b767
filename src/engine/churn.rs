// ==========================================
// 飞行训练排班系统 - 变更率计算
// ==========================================
// churn = 分配发生变化的时段数 / 父版本时段总数
// 父版本为空 (或无父版本) 时定义为 0
// ==========================================

use crate::domain::roster::RosterDiff;
use crate::domain::sortie::Slot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChurnReport {
    pub changed: usize,
    pub total: usize,
    pub churn: f64,
}

impl ChurnReport {
    /// 是否超出目标 (等于目标不算超出)
    pub fn exceeds(&self, target: f64) -> bool {
        self.churn > target
    }
}

pub struct ChurnCalculator;

impl ChurnCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(&self, parent: &[Slot], diff: &RosterDiff) -> ChurnReport {
        let changed = diff.changed_count();
        let total = parent.len();
        let churn = if total == 0 {
            0.0
        } else {
            changed as f64 / total as f64
        };
        ChurnReport {
            changed,
            total,
            churn,
        }
    }
}

impl Default for ChurnCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_parent_has_zero_churn() {
        let diff = RosterDiff {
            added: vec!["SLOT-R1".to_string()],
            ..Default::default()
        };
        let report = ChurnCalculator::new().compute(&[], &diff);
        assert_eq!(report.churn, 0.0);
        assert!(!report.exceeds(0.30));
    }

    #[test]
    fn test_redispatch_does_not_count() {
        let diff = RosterDiff {
            removed: vec!["SLOT-R1".to_string()],
            redispatched: vec!["SLOT-R2".to_string()],
            ..Default::default()
        };
        assert_eq!(diff.changed_count(), 1);
    }
}
