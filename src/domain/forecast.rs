// ==========================================
// 血库管理核心 - 需求预测领域模型
// ==========================================
// 红线: 预测值是参考信号,不是约束值; 允许最终一致
// ==========================================

use crate::domain::types::{BloodType, UrgencyLevel};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// DemandForecast - 单血型需求预测
// ==========================================
// 对齐: demand_forecast 表 (主键 blood_type)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandForecast {
    pub blood_type: BloodType,
    pub current_stock: u32,        // 当前可用库存单位数
    pub short_term_demand: u32,    // 待审批 + 已批准申请的单位合计
    pub medium_term_demand: f64,   // 线性外推
    pub urgency_level: UrgencyLevel,
    pub urgency_reason: String,    // 判定依据 (JSON)
    pub computed_at: NaiveDateTime,
}
