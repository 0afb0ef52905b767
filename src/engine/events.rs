// ==========================================
// 飞行训练排班系统 - 引擎层事件发布
// ==========================================
// 职责: 定义排班事件发布 trait, 通知下游 (引用渲染 / 通知推送)
// 说明: 引擎只依赖 trait, 具体适配器由外层注入
// 红线: 发布失败只记录日志, 不影响已提交的版本
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 排班事件类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosterEventType {
    /// 新版本已提交
    VersionCommitted,
    /// 重排被拒绝 (最新版本不变)
    ReplanRejected,
    /// 放行结论重算完成
    DispatchRecomputed,
}

impl RosterEventType {
    pub fn as_str(&self) -> &str {
        match self {
            RosterEventType::VersionCommitted => "VersionCommitted",
            RosterEventType::ReplanRejected => "ReplanRejected",
            RosterEventType::DispatchRecomputed => "DispatchRecomputed",
        }
    }
}

/// 排班事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEvent {
    /// 排班周
    pub week_start: NaiveDate,
    /// 版本标识 (被拒绝时为父版本)
    pub version_id: String,
    pub event_type: RosterEventType,
    /// 触发扰动
    pub disruption_id: Option<String>,
}

impl RosterEvent {
    pub fn new(
        week_start: NaiveDate,
        version_id: String,
        event_type: RosterEventType,
        disruption_id: Option<String>,
    ) -> Self {
        Self {
            week_start,
            version_id,
            event_type,
            disruption_id,
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 排班事件发布者
///
/// # 返回
/// - `Ok(task_id)`: 下游任务 ID (不支持时为空字符串)
/// - `Err`: 发布失败
pub trait RosterEventPublisher: Send + Sync {
    fn publish(&self, event: RosterEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者 (单元测试)
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl RosterEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: RosterEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - version_id={}, event_type={}",
            event.version_id,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn RosterEventPublisher>> 的使用
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn RosterEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn RosterEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn from_option(publisher: Option<Arc<dyn RosterEventPublisher>>) -> Self {
        match publisher {
            Some(p) => Self::with_publisher(p),
            None => Self::none(),
        }
    }

    /// 发布事件 (失败时记录告警)
    pub fn publish(&self, event: RosterEvent) {
        let Some(publisher) = &self.inner else {
            tracing::debug!(
                "OptionalEventPublisher: 未配置发布者，跳过事件 - version_id={}, event_type={}",
                event.version_id,
                event.event_type.as_str()
            );
            return;
        };

        let version_id = event.version_id.clone();
        match publisher.publish(event) {
            Ok(task_id) => {
                if !task_id.is_empty() {
                    tracing::info!("排班事件已发布: task_id={}, version_id={}", task_id, version_id);
                }
            }
            Err(e) => {
                tracing::warn!("排班事件发布失败: version_id={}, error={}", version_id, e);
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
