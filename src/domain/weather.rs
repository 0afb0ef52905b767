// ==========================================
// 飞行训练排班系统 - 气象观测领域模型
// ==========================================
// 依据: 气象数据源接口 - 按机场与时间窗口提供观测
// 说明: 无观测 = 未知, 由放行评估按保守原则处理
// ==========================================

use crate::domain::types::TimeWindow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// WeatherObservation - 单个窗口的气象观测
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub window: TimeWindow,              // 有效窗口
    pub ceiling_ft: Option<u32>,         // 云底高 (ft AGL), None = 无云幂
    pub visibility_sm: f64,              // 能见度 (SM)
    pub wind_kt: u32,                    // 风速 (kt)
    #[serde(default)]
    pub wind_direction_deg: Option<u16>, // 风向 (度)
    pub crosswind_kt: u32,               // 侧风分量 (kt)
    #[serde(default)]
    pub thunderstorm_within_10nm: bool,  // 10NM 内雷暴
}

// ==========================================
// WeatherBoard - 基地机场的观测集合
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherBoard {
    pub airfield: String,
    pub observations: Vec<WeatherObservation>,
}

impl WeatherBoard {
    pub fn new(airfield: &str, observations: Vec<WeatherObservation>) -> Self {
        Self {
            airfield: airfield.to_string(),
            observations,
        }
    }

    /// 查找覆盖给定时刻的观测
    ///
    /// 多个窗口重叠时取最晚加入的一条 (后到的更新覆盖先前观测)
    pub fn observation_at(&self, t: NaiveDateTime) -> Option<&WeatherObservation> {
        self.observations
            .iter()
            .rev()
            .find(|o| o.window.contains_instant(t))
    }

    /// 叠加一条新观测, 返回新板 (原板不变)
    pub fn with_observation(&self, observation: WeatherObservation) -> Self {
        let mut next = self.clone();
        next.observations.push(observation);
        next
    }
}
