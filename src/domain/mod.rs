// ==========================================
// 血库管理核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod donor;
pub mod forecast;
pub mod inventory;
pub mod matching;
pub mod request;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use donor::{DonorContact, DonorProfile, GeoPoint, NewDonor};
pub use forecast::DemandForecast;
pub use inventory::{BatchDeduction, DeductionReceipt, InventoryBatch, StockLevel};
pub use matching::{MatchOutcome, MatchedDonor};
pub use request::{BloodRequest, NewBloodRequest};
pub use types::{
    BatchStatus, BloodType, MatchType, RequestPriority, RequestStatus, UrgencyLevel,
};
