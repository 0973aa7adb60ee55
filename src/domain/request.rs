// ==========================================
// 血库管理核心 - 用血申请领域模型
// ==========================================
// 职责: 医院用血申请实体
// 并发: revision 字段用于乐观锁
// ==========================================

use crate::domain::types::{BloodType, RequestPriority, RequestStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// BloodRequest - 用血申请
// ==========================================
// 对齐: blood_request 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloodRequest {
    pub request_id: String,
    pub hospital_name: String,
    pub contact_email: Option<String>,
    pub blood_type: BloodType,
    pub units_requested: u32,
    pub priority: RequestPriority,
    pub status: RequestStatus,
    pub notes: Option<String>,
    pub revision: i32, // 乐观锁版本号

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// NewBloodRequest - 申请创建输入
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBloodRequest {
    pub hospital_name: String,
    pub contact_email: Option<String>,
    pub blood_type: String,
    pub units_requested: i64,
    pub priority: String,
    pub notes: Option<String>,
}
