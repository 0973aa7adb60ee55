// ==========================================
// 血库管理核心 - 配置层
// ==========================================
// 职责: 系统参数管理 (献血间隔、保存期、预测系数等)
// 存储: config_kv 表 (global scope)
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, BloodBankSettings, ConfigManager, GeolocationMode};
