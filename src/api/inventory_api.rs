// ==========================================
// 血库管理核心 - 库存 API
// ==========================================
// 职责: 献血入库、出库扣减、可用量查询、过期清扫、库存汇总
// 约束: 每次库存变动后重算对应血型的需求预测（尽力而为）
// ==========================================

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator;
use crate::config::ConfigManager;
use crate::domain::forecast::DemandForecast;
use crate::domain::inventory::{DeductionReceipt, InventoryBatch, StockLevel};
use crate::domain::types::BloodType;
use crate::engine::clock::Clock;
use crate::engine::demand_forecaster::DemandForecaster;
use crate::engine::inventory_ledger::InventoryLedger;
use crate::engine::repositories::BloodBankRepositories;

/// 献血入库结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationOutcome {
    pub batch: InventoryBatch,
    pub forecast: Option<DemandForecast>,
}

/// 过期清扫结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpirySweepReport {
    pub expired: Vec<InventoryBatch>,
    pub expired_units: u64,
    pub forecasts_refreshed: usize,
}

// ==========================================
// InventoryApi - 库存 API
// ==========================================
pub struct InventoryApi {
    repos: BloodBankRepositories,
    config: Arc<ConfigManager>,
    ledger: Arc<InventoryLedger>,
    forecaster: Arc<DemandForecaster>,
    clock: Arc<dyn Clock>,
}

impl InventoryApi {
    pub fn new(
        repos: BloodBankRepositories,
        config: Arc<ConfigManager>,
        ledger: Arc<InventoryLedger>,
        forecaster: Arc<DemandForecaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            config,
            ledger,
            forecaster,
            clock,
        }
    }

    /// 登记献血: 新建可用批次（失效 = 今天 + 保存期）并更新献血者末次献血日期
    #[instrument(skip(self))]
    pub fn record_donation(
        &self,
        donor_id: &str,
        blood_type: &str,
        center_id: Option<&str>,
        actor: &str,
    ) -> ApiResult<DonationOutcome> {
        let blood_type = validator::parse_blood_type(blood_type)?;
        let center_id = validator::normalize_optional(center_id);
        let settings = self.config.load_settings()?;

        let batch = self
            .ledger
            .record_donation(donor_id, blood_type, center_id.as_deref(), &settings, actor)
            .map_err(|e| ApiError::from(e).on_write("record_donation"))?;

        let forecast = self.forecaster.refresh(blood_type);
        Ok(DonationOutcome { batch, forecast })
    }

    /// 直接出库扣减（不经申请审批,如报损、调拨）
    #[instrument(skip(self))]
    pub fn deduct_units(
        &self,
        blood_type: &str,
        units: i64,
        actor: &str,
    ) -> ApiResult<DeductionReceipt> {
        let blood_type = validator::parse_blood_type(blood_type)?;
        let units = validator::validate_units(units)?;

        let receipt = self
            .ledger
            .deduct_units(blood_type, units, actor)
            .map_err(|e| ApiError::from(e).on_write("deduct_units"))?;

        self.forecaster.refresh(blood_type);
        Ok(receipt)
    }

    /// 可出库单位合计
    pub fn available_units(&self, blood_type: &str) -> ApiResult<u32> {
        let blood_type = validator::parse_blood_type(blood_type)?;
        Ok(self.ledger.available_units(blood_type)?)
    }

    /// 可出库批次（先到期在前）
    pub fn list_available_batches(&self, blood_type: &str) -> ApiResult<Vec<InventoryBatch>> {
        let blood_type = validator::parse_blood_type(blood_type)?;
        Ok(self.ledger.list_available_batches(blood_type)?)
    }

    /// 批次全量历史（含已用/过期）
    pub fn list_batch_history(&self, blood_type: &str) -> ApiResult<Vec<InventoryBatch>> {
        let blood_type = validator::parse_blood_type(blood_type)?;
        Ok(self.repos.inventory_repo.find_by_blood_type(blood_type)?)
    }

    /// 过期清扫并重算受影响血型的预测
    #[instrument(skip(self))]
    pub fn expire_stale_batches(&self, actor: &str) -> ApiResult<ExpirySweepReport> {
        let expired = self
            .ledger
            .expire_stale_batches(actor)
            .map_err(|e| ApiError::from(e).on_write("expire_stale_batches"))?;

        let affected: BTreeSet<BloodType> = expired.iter().map(|b| b.blood_type).collect();
        let forecasts_refreshed = affected
            .into_iter()
            .filter_map(|bt| self.forecaster.refresh(bt))
            .count();

        Ok(ExpirySweepReport {
            expired_units: expired.iter().map(|b| u64::from(b.units)).sum(),
            expired,
            forecasts_refreshed,
        })
    }

    /// 按血型汇总可出库库存（8 种血型齐全,无库存为 0）
    pub fn stock_summary(&self) -> ApiResult<Vec<StockLevel>> {
        let levels = self
            .repos
            .inventory_repo
            .summarize_available(self.clock.today())?;

        Ok(BloodType::ALL
            .iter()
            .map(|bt| {
                levels
                    .iter()
                    .find(|l| l.blood_type == *bt)
                    .cloned()
                    .unwrap_or_else(|| StockLevel::empty(*bt))
            })
            .collect())
    }
}
