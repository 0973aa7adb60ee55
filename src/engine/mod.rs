// ==========================================
// 血库管理核心 - 引擎层
// ==========================================
// 职责: 相容性、距离、匹配、台账扣减、需求预测、通知分发
// 红线: Engine 不拼 SQL, 数据访问一律经 Repository
// ==========================================

pub mod clock;
pub mod compatibility;
pub mod demand_forecaster;
pub mod distance;
pub mod donor_matcher;
pub mod eligibility;
pub mod error;
pub mod geolocation;
pub mod inventory_ledger;
pub mod locks;
pub mod notification;
pub mod repositories;

// 重导出核心引擎
pub use clock::{Clock, FixedClock, SystemClock};
pub use compatibility::{can_donate_to, compatible_donors};
pub use demand_forecaster::DemandForecaster;
pub use distance::distance_km;
pub use donor_matcher::DonorMatcher;
pub use eligibility::{evaluate_donation_interval, DonationEligibility};
pub use error::{EngineError, EngineResult};
pub use geolocation::{DemoGeolocation, GeolocationProvider, ProfileGeolocation};
pub use inventory_ledger::{plan_fifo_deduction, InventoryLedger};
pub use locks::BloodTypeLocks;
pub use notification::{
    DispatchReport, LoggingNotificationService, NotificationDispatcher, NotificationEvent,
    NotificationService, Recipient,
};
pub use repositories::BloodBankRepositories;
