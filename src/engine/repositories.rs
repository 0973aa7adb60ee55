// ==========================================
// 血库管理核心 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合引擎与 API 所需的全部 Repository 与事务单元
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    ActionLogRepository, BloodRequestRepository, DemandForecastRepository, DonorRepository,
    InventoryBatchRepository, UnitOfWork,
};

/// 血库仓储集合
///
/// 所有仓储共享同一个连接; `uow` 用于跨表事务写入
#[derive(Clone)]
pub struct BloodBankRepositories {
    pub donor_repo: Arc<DonorRepository>,
    pub inventory_repo: Arc<InventoryBatchRepository>,
    pub request_repo: Arc<BloodRequestRepository>,
    pub forecast_repo: Arc<DemandForecastRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
    pub uow: Arc<UnitOfWork>,
}

impl BloodBankRepositories {
    /// 基于共享连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            donor_repo: Arc::new(DonorRepository::new(conn.clone())),
            inventory_repo: Arc::new(InventoryBatchRepository::new(conn.clone())),
            request_repo: Arc::new(BloodRequestRepository::new(conn.clone())),
            forecast_repo: Arc::new(DemandForecastRepository::new(conn.clone())),
            action_log_repo: Arc::new(ActionLogRepository::new(conn.clone())),
            uow: Arc::new(UnitOfWork::new(conn)),
        }
    }
}
