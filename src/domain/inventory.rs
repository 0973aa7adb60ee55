// ==========================================
// 血库管理核心 - 库存批次领域模型
// ==========================================
// 职责: 库存批次、扣减明细、库存汇总
// 红线: 批次单位数永不为负; 耗尽批次标记 USED 而非删除(审计留痕)
// ==========================================

use crate::domain::types::{BatchStatus, BloodType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// InventoryBatch - 库存批次
// ==========================================
// 对齐: inventory_batch 表
// 生命周期: 登记献血时创建 → 审批出库时扣减/耗尽 → 过期清扫时标记 EXPIRED
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryBatch {
    pub batch_id: String,
    pub blood_type: BloodType,
    pub units: u32,               // 当前剩余单位数
    pub donation_date: NaiveDate, // 采集日期
    pub expiry_date: NaiveDate,   // 失效日期 = 采集日期 + 保存期
    pub status: BatchStatus,

    // ===== 来源 =====
    pub donor_id: Option<String>,
    pub center_id: Option<String>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl InventoryBatch {
    /// 在 `today` 是否仍可出库
    ///
    /// 失效日期当天仍可用,过了失效日期才算过期
    pub fn is_usable_on(&self, today: NaiveDate) -> bool {
        self.status == BatchStatus::Available && self.units > 0 && self.expiry_date >= today
    }
}

// ==========================================
// BatchDeduction - 单批次扣减明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDeduction {
    pub batch_id: String,
    pub expiry_date: NaiveDate,
    pub units_before: u32,
    pub units_deducted: u32,
    pub units_after: u32,
    pub status_after: BatchStatus,
}

// ==========================================
// DeductionReceipt - 一次出库的扣减凭证
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionReceipt {
    pub blood_type: BloodType,
    pub units_requested: u32,
    pub deductions: Vec<BatchDeduction>,
}

impl DeductionReceipt {
    /// 实际扣减总数（成功时必须等于 units_requested）
    pub fn total_deducted(&self) -> u32 {
        self.deductions.iter().map(|d| d.units_deducted).sum()
    }
}

// ==========================================
// StockLevel - 单血型库存汇总
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevel {
    pub blood_type: BloodType,
    pub available_units: u32,
    pub batch_count: u32,
    pub earliest_expiry: Option<NaiveDate>,
}

impl StockLevel {
    pub fn empty(blood_type: BloodType) -> Self {
        Self {
            blood_type,
            available_units: 0,
            batch_count: 0,
            earliest_expiry: None,
        }
    }
}
