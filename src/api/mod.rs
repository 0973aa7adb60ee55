// ==========================================
// 血库管理核心 - API 层
// ==========================================
// 职责: 用例门面: 输入校验、事务编排、错误分类、日志
// ==========================================

pub mod dashboard_api;
pub mod donor_api;
pub mod error;
pub mod inventory_api;
pub mod matching_api;
pub mod request_api;
pub mod validator;

// 重导出核心类型
pub use dashboard_api::{BloodTypeOverview, DashboardApi};
pub use donor_api::{DonorApi, DonorDetail};
pub use error::{ApiError, ApiResult};
pub use inventory_api::{DonationOutcome, ExpirySweepReport, InventoryApi};
pub use matching_api::{DonorOutreachSummary, MatchingApi};
pub use request_api::{ApprovalOutcome, RequestApi};
