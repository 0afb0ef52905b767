// ==========================================
// 飞行训练排班系统 - 请求优先级排序
// ==========================================
// 职责: 决定贪心排班器处理请求的先后顺序
// 排序键:
// 1) 科目优先级 (CHK_PREP > SOLO > NAV > CIRCUITS > SIM_PROCEDURES, 可配置)
// 2) 允许窗口开始时间升序
// 3) 学员阶段降序 (高阶段学员优先, 保持训练节奏)
// 4) request_id 升序 (保证确定性)
// ==========================================

use crate::config::EngineConfig;
use crate::domain::resource::ResourcePool;
use crate::domain::sortie::SortieRequest;
use std::cmp::{Ordering, Reverse};

// ==========================================
// PrioritySorter - 请求排序器
// ==========================================
pub struct PrioritySorter {
    // 无状态引擎,不需要注入依赖
}

impl PrioritySorter {
    pub fn new() -> Self {
        Self {}
    }

    /// 按优先级排序请求
    ///
    /// # 参数
    /// - `requests`: 待排请求
    /// - `pool`: 资源池 (读取学员阶段; 未知学员按最低阶段处理)
    /// - `config`: 科目优先级表
    ///
    /// # 返回
    /// 排序后的请求 (从高到低)
    pub fn sort(
        &self,
        mut requests: Vec<SortieRequest>,
        pool: &ResourcePool,
        config: &EngineConfig,
    ) -> Vec<SortieRequest> {
        requests.sort_by(|a, b| self.compare(a, b, pool, config));
        requests
    }

    /// 比较两个请求的优先级 (Less = a 先处理)
    pub fn compare(
        &self,
        a: &SortieRequest,
        b: &SortieRequest,
        pool: &ResourcePool,
        config: &EngineConfig,
    ) -> Ordering {
        let key = |r: &SortieRequest| {
            let stage = pool.student(&r.student_id).map(|s| s.stage.level()).unwrap_or(0);
            (
                config.priority_of(r.sortie_type),
                r.window.start,
                Reverse(stage),
            )
        };
        key(a)
            .cmp(&key(b))
            .then_with(|| a.request_id.cmp(&b.request_id))
    }
}

impl Default for PrioritySorter {
    fn default() -> Self {
        Self::new()
    }
}
