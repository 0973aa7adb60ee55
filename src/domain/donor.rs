// ==========================================
// 血库管理核心 - 献血者领域模型
// ==========================================
// 职责: 献血者身份、血型、末次献血日期、献血资格标志
// 红线: 不含数据访问逻辑; 间隔资格由引擎层推导,不落库
// ==========================================

use crate::domain::types::BloodType;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// GeoPoint - 地理坐标
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,  // 纬度 [-90, 90]
    pub longitude: f64, // 经度 [-180, 180]
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// 坐标是否在合法范围内
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

// ==========================================
// DonorProfile - 献血者档案
// ==========================================
// 对齐: donor 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorProfile {
    // ===== 主键 =====
    pub donor_id: String,

    // ===== 医学属性 =====
    pub blood_type: BloodType,
    pub last_donation_date: Option<NaiveDate>, // None = 从未献血

    // ===== 资格 =====
    pub eligible_to_donate: bool, // 登记资格(暂缓/永久屏蔽时为 false)

    // ===== 审计 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// DonorContact - 献血者联系资料
// ==========================================
// 对齐: donor_profile 表
// 用途: 匹配结果联结、通知收件人
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorContact {
    pub donor_id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub location: Option<GeoPoint>,
}

// ==========================================
// NewDonor - 献血者登记输入
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDonor {
    pub full_name: String,
    pub blood_type: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub location: Option<GeoPoint>,
    pub last_donation_date: Option<NaiveDate>,
}
