// ==========================================
// 血库管理核心 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 献血者匹配、库存台账、需求预测与通知
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    BatchStatus, BloodType, MatchType, RequestPriority, RequestStatus, UrgencyLevel,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, BloodRequest, DemandForecast, DonorContact, DonorProfile, GeoPoint,
    InventoryBatch, MatchOutcome, MatchedDonor,
};

// 引擎
pub use engine::{
    can_donate_to, compatible_donors, distance_km, DemandForecaster, DonorMatcher,
    InventoryLedger, NotificationDispatcher,
};

// API
pub use api::{ApiError, DashboardApi, DonorApi, InventoryApi, MatchingApi, RequestApi};

// 应用
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "血库管理核心";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.is_empty());
    }
}
