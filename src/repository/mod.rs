// ==========================================
// 血库管理核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: `*_in(conn, ..)` 关联函数供 UnitOfWork 事务内调用
// ==========================================

pub mod action_log_repo;
pub mod donor_repo;
pub mod error;
pub mod forecast_repo;
pub mod inventory_repo;
pub mod request_repo;
pub mod sql_types;
pub mod unit_of_work;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use donor_repo::DonorRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use forecast_repo::DemandForecastRepository;
pub use inventory_repo::InventoryBatchRepository;
pub use request_repo::BloodRequestRepository;
pub use unit_of_work::UnitOfWork;
