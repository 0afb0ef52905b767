// ==========================================
// 飞行训练排班系统 - 扰动事件领域模型
// ==========================================
// 依据: 扰动重排 - DisruptionEvent
// 类型: WEATHER / AIRCRAFT / INSTRUCTOR / STUDENT
// ==========================================

use crate::domain::types::{AircraftStatus, DisruptionKind, TimeWindow};
use crate::domain::weather::WeatherObservation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// DisruptionState - 扰动带来的新资源状态
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisruptionState {
    /// 新气象观测 (WEATHER)
    Weather(WeatherObservation),
    /// 飞机状态变更 (AIRCRAFT)
    AircraftStatus(AircraftStatus),
    /// 人员不可用 (INSTRUCTOR / STUDENT)
    Unavailable,
}

// ==========================================
// DisruptionEvent - 扰动事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisruptionEvent {
    pub event_id: String,          // 事件ID (同一事件只处理一次)
    pub kind: DisruptionKind,      // 扰动类型
    pub resource_id: String,       // 受影响资源 (WEATHER 为机场代码)
    pub window: TimeWindow,        // 生效窗口
    pub new_state: DisruptionState,
}

impl DisruptionEvent {
    /// 创建事件, 自动生成事件ID
    pub fn new(
        kind: DisruptionKind,
        resource_id: &str,
        window: TimeWindow,
        new_state: DisruptionState,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            resource_id: resource_id.to_string(),
            window,
            new_state,
        }
    }

    /// 使用调用方提供的事件ID (重放/确定性测试)
    pub fn with_id(mut self, event_id: &str) -> Self {
        self.event_id = event_id.to_string();
        self
    }

    /// 类型与新状态是否匹配
    pub fn is_well_formed(&self) -> bool {
        let state_ok = matches!(
            (&self.kind, &self.new_state),
            (DisruptionKind::Weather, DisruptionState::Weather(_))
                | (DisruptionKind::Aircraft, DisruptionState::AircraftStatus(_))
                | (DisruptionKind::Instructor, DisruptionState::Unavailable)
                | (DisruptionKind::Student, DisruptionState::Unavailable)
        );
        state_ok && self.window.is_valid() && !self.event_id.trim().is_empty()
    }
}
