// ==========================================
// 飞行训练排班系统 - 排班版本存储接口
// ==========================================
// 红线: 每周线性版本链, 只追加
// - 首版 seq=0 且无父版本
// - 后续版本 seq = 最新 seq + 1, parent_seq = 最新 seq
// 违反即 VersionConflict, 不写入
// ==========================================

use crate::domain::roster::RosterVersion;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Mutex;

// ==========================================
// RosterVersionStore - 版本存储 Trait
// ==========================================
pub trait RosterVersionStore: Send + Sync {
    /// 追加版本 (校验版本链)
    fn append(&self, version: &RosterVersion) -> RepositoryResult<()>;

    /// 最新已提交版本
    fn latest(&self, week_start: NaiveDate) -> RepositoryResult<Option<RosterVersion>>;

    /// 指定序号版本
    fn get(&self, week_start: NaiveDate, seq: u32) -> RepositoryResult<Option<RosterVersion>>;

    /// 全部版本 (seq 升序)
    fn history(&self, week_start: NaiveDate) -> RepositoryResult<Vec<RosterVersion>>;

    /// 扰动事件是否已被某个版本处理
    fn contains_disruption(&self, week_start: NaiveDate, event_id: &str) -> RepositoryResult<bool> {
        Ok(self
            .history(week_start)?
            .iter()
            .any(|v| v.disruption_id.as_deref() == Some(event_id)))
    }
}

/// 版本链校验
pub(crate) fn check_chain(latest_seq: Option<u32>, version: &RosterVersion) -> RepositoryResult<()> {
    let expected_seq = latest_seq.map(|s| s + 1).unwrap_or(0);
    if version.seq != expected_seq || version.parent_seq != latest_seq {
        return Err(RepositoryError::VersionConflict {
            message: format!(
                "week={}, 期望 seq={} parent={:?}, 实际 seq={} parent={:?}",
                version.week_start, expected_seq, latest_seq, version.seq, version.parent_seq
            ),
        });
    }
    Ok(())
}

// ==========================================
// InMemoryRosterStore - 内存实现 (测试/嵌入)
// ==========================================
#[derive(Default)]
pub struct InMemoryRosterStore {
    weeks: Mutex<BTreeMap<NaiveDate, Vec<RosterVersion>>>,
}

impl InMemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> RepositoryResult<std::sync::MutexGuard<'_, BTreeMap<NaiveDate, Vec<RosterVersion>>>> {
        self.weeks
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl RosterVersionStore for InMemoryRosterStore {
    fn append(&self, version: &RosterVersion) -> RepositoryResult<()> {
        let mut weeks = self.lock()?;
        let chain = weeks.entry(version.week_start).or_default();
        check_chain(chain.last().map(|v| v.seq), version)?;
        chain.push(version.clone());
        Ok(())
    }

    fn latest(&self, week_start: NaiveDate) -> RepositoryResult<Option<RosterVersion>> {
        Ok(self
            .lock()?
            .get(&week_start)
            .and_then(|chain| chain.last().cloned()))
    }

    fn get(&self, week_start: NaiveDate, seq: u32) -> RepositoryResult<Option<RosterVersion>> {
        Ok(self
            .lock()?
            .get(&week_start)
            .and_then(|chain| chain.iter().find(|v| v.seq == seq).cloned()))
    }

    fn history(&self, week_start: NaiveDate) -> RepositoryResult<Vec<RosterVersion>> {
        Ok(self.lock()?.get(&week_start).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::roster::RosterDiff;

    fn version(seq: u32, parent: Option<u32>) -> RosterVersion {
        RosterVersion {
            week_start: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            seq,
            parent_seq: parent,
            slots: vec![],
            diff: RosterDiff::default(),
            disruption_id: parent.map(|_| format!("EV-{}", seq)),
            disruption_kind: parent.map(|_| crate::domain::types::DisruptionKind::Aircraft),
            churn: 0.0,
            churn_exceeded: false,
            unplaced: vec![],
            committed_at: NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_linear_chain_enforced() {
        let store = InMemoryRosterStore::new();
        assert!(matches!(
            store.append(&version(1, Some(0))),
            Err(RepositoryError::VersionConflict { .. })
        ));
        store.append(&version(0, None)).unwrap();
        store.append(&version(1, Some(0))).unwrap();
        assert!(store.append(&version(1, Some(0))).is_err());
        assert!(store.append(&version(3, Some(1))).is_err());

        let week = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(store.latest(week).unwrap().unwrap().seq, 1);
        assert_eq!(store.history(week).unwrap().len(), 2);
        assert!(store.contains_disruption(week, "EV-1").unwrap());
        assert!(!store.contains_disruption(week, "EV-9").unwrap());
    }
}
