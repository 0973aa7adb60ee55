// ==========================================
// 血库管理核心 - 库存台账引擎
// ==========================================
// 职责: 先到期先出 (FIFO-by-expiry) 扣减、献血入库、过期清扫
// 红线:
// - 单次扣减总量必须恰好等于需求量,批次单位数永不为负
// - 可用总量不足时整体失败,不提交任何部分扣减
// - 耗尽批次标记 USED,不删除
// 并发: 血型锁 + 事务内批次条件更新 (见 BloodTypeLocks / apply_deduction_in)
// ==========================================

use crate::config::BloodBankSettings;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::inventory::{BatchDeduction, DeductionReceipt, InventoryBatch};
use crate::domain::types::{BatchStatus, BloodType};
use crate::engine::clock::Clock;
use crate::engine::eligibility::evaluate_donation_interval;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::locks::BloodTypeLocks;
use crate::engine::repositories::BloodBankRepositories;
use crate::repository::{
    ActionLogRepository, DonorRepository, InventoryBatchRepository, RepositoryError,
};
use chrono::{Days, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

// ==========================================
// 纯函数: 扣减计划
// ==========================================

/// 计算先到期先出的扣减计划（不写库）
///
/// # 规则
/// - 只使用 `today` 仍可出库的批次 (AVAILABLE, units > 0, 未过失效日)
/// - 按失效日期升序,同日按入库时间、批次号
/// - 每批扣 min(剩余需求, 批次单位数); 扣完标记 USED
///
/// # 错误
/// - `Validation`: units_needed 为 0
/// - `InsufficientStock`: 可用合计 < units_needed
pub fn plan_fifo_deduction(
    blood_type: BloodType,
    batches: &[InventoryBatch],
    units_needed: u32,
    today: NaiveDate,
) -> EngineResult<DeductionReceipt> {
    if units_needed == 0 {
        return Err(EngineError::Validation("扣减单位数必须为正数".to_string()));
    }

    let mut usable: Vec<&InventoryBatch> = batches
        .iter()
        .filter(|b| b.blood_type == blood_type && b.is_usable_on(today))
        .collect();
    usable.sort_by(|a, b| {
        a.expiry_date
            .cmp(&b.expiry_date)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.batch_id.cmp(&b.batch_id))
    });

    let available: u64 = usable.iter().map(|b| u64::from(b.units)).sum();
    if available < u64::from(units_needed) {
        return Err(EngineError::InsufficientStock {
            blood_type,
            requested: units_needed,
            available: u32::try_from(available).unwrap_or(u32::MAX),
        });
    }

    let mut remaining = units_needed;
    let mut deductions = Vec::new();
    for batch in usable {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.units);
        let units_after = batch.units - take;
        deductions.push(BatchDeduction {
            batch_id: batch.batch_id.clone(),
            expiry_date: batch.expiry_date,
            units_before: batch.units,
            units_deducted: take,
            units_after,
            status_after: if units_after == 0 {
                BatchStatus::Used
            } else {
                BatchStatus::Available
            },
        });
        remaining -= take;
    }

    Ok(DeductionReceipt {
        blood_type,
        units_requested: units_needed,
        deductions,
    })
}

/// 构造献血入库批次（失效日期 = 采集日期 + 保存期）
pub fn build_donation_batch(
    donor_id: Option<&str>,
    blood_type: BloodType,
    center_id: Option<&str>,
    donation_date: NaiveDate,
    settings: &BloodBankSettings,
    now: NaiveDateTime,
) -> EngineResult<InventoryBatch> {
    let expiry_date = u64::try_from(settings.shelf_life_days)
        .ok()
        .filter(|d| *d > 0)
        .and_then(|d| donation_date.checked_add_days(Days::new(d)))
        .ok_or_else(|| {
            EngineError::Validation(format!(
                "保存期天数非法: {} (采集日期 {})",
                settings.shelf_life_days, donation_date
            ))
        })?;

    Ok(InventoryBatch {
        batch_id: Uuid::new_v4().to_string(),
        blood_type,
        units: settings.units_per_donation,
        donation_date,
        expiry_date,
        status: BatchStatus::Available,
        donor_id: donor_id.map(str::to_string),
        center_id: center_id.map(str::to_string),
        created_at: now,
        updated_at: now,
    })
}

// ==========================================
// InventoryLedger - 库存台账
// ==========================================
pub struct InventoryLedger {
    repos: BloodBankRepositories,
    locks: Arc<BloodTypeLocks>,
    clock: Arc<dyn Clock>,
}

impl InventoryLedger {
    pub fn new(
        repos: BloodBankRepositories,
        locks: Arc<BloodTypeLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            locks,
            clock,
        }
    }

    /// 事务内扣减: 读取可用批次 → 计划 → 逐批条件更新
    ///
    /// 调用方负责持有血型锁并开启事务; 任一步失败由事务整体回滚
    pub fn deduct_in(
        conn: &Connection,
        blood_type: BloodType,
        units_needed: u32,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> EngineResult<DeductionReceipt> {
        let batches = InventoryBatchRepository::find_available_in(conn, blood_type, today)?;
        let receipt = plan_fifo_deduction(blood_type, &batches, units_needed, today)?;

        for deduction in &receipt.deductions {
            InventoryBatchRepository::apply_deduction_in(conn, deduction, now)?;
        }

        debug_assert_eq!(receipt.total_deducted(), units_needed);
        Ok(receipt)
    }

    /// 直接出库扣减（不关联申请）
    #[instrument(skip(self))]
    pub fn deduct_units(
        &self,
        blood_type: BloodType,
        units_needed: u32,
        actor: &str,
    ) -> EngineResult<DeductionReceipt> {
        let _guard = self.locks.acquire(blood_type)?;
        let today = self.clock.today();
        let now = self.clock.now();

        let receipt = self.repos.uow.run(|tx| -> EngineResult<DeductionReceipt> {
            let receipt = Self::deduct_in(tx, blood_type, units_needed, today, now)?;
            let log = ActionLog::new(ActionType::DeductInventory, actor, now)
                .with_blood_type(blood_type.as_str())
                .with_payload(json!({
                    "units": units_needed,
                    "deductions": &receipt.deductions,
                }));
            ActionLogRepository::insert_in(tx, &log)?;
            Ok(receipt)
        })?;

        tracing::info!(
            units = units_needed,
            batches_touched = receipt.deductions.len(),
            "库存扣减完成"
        );
        Ok(receipt)
    }

    /// 登记献血入库
    ///
    /// # 规则
    /// - 献血者必须存在,且档案血型与登记血型一致
    /// - 未满献血间隔的重复登记被拒绝
    /// - 批次入库与献血者末次献血日期更新在同一事务内
    #[instrument(skip(self, settings))]
    pub fn record_donation(
        &self,
        donor_id: &str,
        blood_type: BloodType,
        center_id: Option<&str>,
        settings: &BloodBankSettings,
        actor: &str,
    ) -> EngineResult<InventoryBatch> {
        let today = self.clock.today();
        let now = self.clock.now();

        let batch = self.repos.uow.run(|tx| -> EngineResult<InventoryBatch> {
            let donor = DonorRepository::find_by_id_in(tx, donor_id)?
                .ok_or_else(|| RepositoryError::not_found("Donor", donor_id))?;

            if donor.blood_type != blood_type {
                return Err(EngineError::Validation(format!(
                    "献血者 {} 档案血型为 {}，与登记血型 {} 不一致",
                    donor_id, donor.blood_type, blood_type
                )));
            }

            let interval = evaluate_donation_interval(
                donor.last_donation_date,
                today,
                settings.donation_interval_days,
            );
            if !interval.eligible {
                return Err(EngineError::Validation(format!(
                    "献血者 {} 距上次献血不足 {} 天（还需 {} 天）",
                    donor_id, settings.donation_interval_days, interval.days_until_eligible
                )));
            }

            let batch = build_donation_batch(
                Some(donor_id),
                blood_type,
                center_id,
                today,
                settings,
                now,
            )?;
            InventoryBatchRepository::insert_in(tx, &batch)?;
            DonorRepository::update_last_donation_in(tx, donor_id, today, now)?;

            let log = ActionLog::new(ActionType::RecordDonation, actor, now)
                .with_entity(batch.batch_id.clone())
                .with_blood_type(blood_type.as_str())
                .with_payload(json!({
                    "donor_id": donor_id,
                    "center_id": center_id,
                    "units": batch.units,
                    "expiry_date": batch.expiry_date,
                }));
            ActionLogRepository::insert_in(tx, &log)?;

            Ok(batch)
        })?;

        tracing::info!(batch_id = %batch.batch_id, expiry = %batch.expiry_date, "献血入库完成");
        Ok(batch)
    }

    /// 过期清扫: 失效日期早于今天的可用批次标记为 EXPIRED
    #[instrument(skip(self))]
    pub fn expire_stale_batches(&self, actor: &str) -> EngineResult<Vec<InventoryBatch>> {
        let today = self.clock.today();
        let now = self.clock.now();

        let expired = self.repos.uow.run(|tx| -> EngineResult<Vec<InventoryBatch>> {
            let expired = InventoryBatchRepository::mark_expired_in(tx, today, now)?;
            if !expired.is_empty() {
                let ids: Vec<&str> = expired.iter().map(|b| b.batch_id.as_str()).collect();
                let units: u64 = expired.iter().map(|b| u64::from(b.units)).sum();
                let log = ActionLog::new(ActionType::ExpireBatches, actor, now).with_payload(json!({
                    "today": today,
                    "batch_ids": ids,
                    "units": units,
                }));
                ActionLogRepository::insert_in(tx, &log)?;
            }
            Ok(expired)
        })?;

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "过期批次已清扫");
        }
        Ok(expired)
    }

    /// 可出库单位合计
    pub fn available_units(&self, blood_type: BloodType) -> EngineResult<u32> {
        Ok(self
            .repos
            .inventory_repo
            .sum_available(blood_type, self.clock.today())?)
    }

    /// 可出库批次（先到期在前）
    pub fn list_available_batches(
        &self,
        blood_type: BloodType,
    ) -> EngineResult<Vec<InventoryBatch>> {
        Ok(self
            .repos
            .inventory_repo
            .find_available(blood_type, self.clock.today())?)
    }
}
