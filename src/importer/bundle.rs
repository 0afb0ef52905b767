// ==========================================
// 飞行训练排班系统 - 周数据包 (JSON) 导入
// ==========================================
// 职责: 读取一整周的录入数据 (资源 + 请求 + 气象 + 待处理扰动)
// 流程: 读取 → serde 反序列化 → 完整性校验 → 周工作状态
// ==========================================

use crate::domain::disruption::DisruptionEvent;
use crate::domain::resource::{Aircraft, Instructor, ResourcePool, Simulator, Student};
use crate::domain::sortie::SortieRequest;
use crate::domain::weather::WeatherBoard;
use crate::engine::orchestrator::WeekState;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::integrity::{IntegrityChecker, IntegrityInput};
use crate::importer::request_csv::RequestCsvParser;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ==========================================
// RosterBundle - 周数据包
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterBundle {
    pub week_start: NaiveDate,
    #[serde(default)]
    pub today: Option<NaiveDate>, // "当日"计数适用日期, 缺省为 week_start
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub instructors: Vec<Instructor>,
    #[serde(default)]
    pub aircraft: Vec<Aircraft>,
    #[serde(default)]
    pub simulators: Vec<Simulator>,
    #[serde(default)]
    pub requests: Vec<SortieRequest>,
    #[serde(default)]
    pub weather: Option<WeatherBoard>,
    #[serde(default)]
    pub disruptions: Vec<DisruptionEvent>, // 按顺序回放
}

impl RosterBundle {
    /// 读取并校验 JSON 数据包
    pub fn load(path: &Path) -> ImportResult<Self> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let bundle = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.display(),
            week_start = %bundle.week_start,
            requests = bundle.requests.len(),
            disruptions = bundle.disruptions.len(),
            "周数据包已加载"
        );
        Ok(bundle)
    }

    /// 从 JSON 文本解析并校验
    pub fn from_json(raw: &str) -> ImportResult<Self> {
        let bundle: RosterBundle = serde_json::from_str(raw)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// 追加 CSV 中的训练请求 (追加后重新校验)
    pub fn merge_request_csv(&mut self, path: &Path) -> ImportResult<usize> {
        let extra = RequestCsvParser.parse_file(path)?;
        let count = extra.len();
        self.requests.extend(extra);
        self.validate()?;
        Ok(count)
    }

    pub fn validate(&self) -> ImportResult<()> {
        IntegrityChecker::new().ensure(&IntegrityInput {
            week_start: self.week_start,
            students: &self.students,
            instructors: &self.instructors,
            aircraft: &self.aircraft,
            simulators: &self.simulators,
            requests: &self.requests,
            weather: self.weather.as_ref(),
        })
    }

    /// 转换为周工作状态
    pub fn week_state(&self) -> WeekState {
        let pool = ResourcePool::new(
            self.today.unwrap_or(self.week_start),
            self.students.clone(),
            self.instructors.clone(),
            self.aircraft.clone(),
            self.simulators.clone(),
        );
        WeekState::new(self.week_start, pool, self.weather.clone())
    }
}
