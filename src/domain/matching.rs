// ==========================================
// 血库管理核心 - 匹配结果模型
// ==========================================
// 说明: 派生、临时对象,不落库
// ==========================================

use crate::domain::types::{BloodType, MatchType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// MatchedDonor - 候选献血者
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedDonor {
    pub donor_id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub blood_type: BloodType,
    pub match_type: MatchType,

    /// 距离(公里); None 表示距离未知, 不等于 0
    pub distance_km: Option<f64>,

    pub last_donation_date: Option<NaiveDate>,
    pub eligible_to_notify: bool,
    pub days_until_eligible: i64,

    /// 相容性评分 (0-100)
    pub score: u32,
    pub match_reason: String,
}

// ==========================================
// MatchOutcome - 匹配结果
// ==========================================
// 依赖失败时降级为空列表 + error 标志,而不是中断调用方
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub donors: Vec<MatchedDonor>,
    pub error: Option<String>,
}

impl MatchOutcome {
    pub fn ok(donors: Vec<MatchedDonor>) -> Self {
        Self {
            donors,
            error: None,
        }
    }

    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            donors: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}
