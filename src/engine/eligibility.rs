// ==========================================
// 血库管理核心 - 献血间隔资格
// ==========================================
// 规则: 距末次献血 >= 间隔天数(默认 56) 才可再次献血
// 红线: 从未献血视为可献血
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// 间隔资格判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationEligibility {
    pub eligible: bool,
    /// 距末次献血天数; 从未献血为 None
    pub days_since_last: Option<i64>,
    /// 距恢复资格剩余天数; 已具备资格时为 0
    pub days_until_eligible: i64,
}

/// 判定献血间隔资格
pub fn evaluate_donation_interval(
    last_donation: Option<NaiveDate>,
    today: NaiveDate,
    interval_days: i64,
) -> DonationEligibility {
    match last_donation {
        None => DonationEligibility {
            eligible: true,
            days_since_last: None,
            days_until_eligible: 0,
        },
        Some(last) => {
            let days_since = (today - last).num_days();
            let eligible = days_since >= interval_days;
            DonationEligibility {
                eligible,
                days_since_last: Some(days_since),
                days_until_eligible: if eligible {
                    0
                } else {
                    interval_days.saturating_sub(days_since)
                },
            }
        }
    }
}

/// 下一次可献血日期; 从未献血返回 Ok(None)（即刻可献）
///
/// # 错误
/// - 间隔天数为负或日期越界时返回 Validation
pub fn next_eligible_date(
    last_donation: Option<NaiveDate>,
    interval_days: i64,
) -> EngineResult<Option<NaiveDate>> {
    let Some(last) = last_donation else {
        return Ok(None);
    };
    u64::try_from(interval_days)
        .ok()
        .and_then(|d| last.checked_add_days(Days::new(d)))
        .map(Some)
        .ok_or_else(|| {
            EngineError::Validation(format!(
                "献血间隔天数非法: {} (末次献血 {})",
                interval_days, last
            ))
        })
}
