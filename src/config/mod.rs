// ==========================================
// 飞行训练排班系统 - 配置层
// ==========================================
// 职责: 引擎参数默认值 + 持久化覆写
// 存储: config_kv 表 / JSON 配置文件
// ==========================================

pub mod config_manager;
pub mod engine_config;

pub use config_manager::{config_keys, ConfigManager};
pub use engine_config::{ChurnPolicy, EngineConfig, MinimaTable, StageMinima, WeatherMinima};
