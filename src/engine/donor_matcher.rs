// ==========================================
// 血库管理核心 - 献血者匹配引擎
// ==========================================
// 流程:
// 1. 查相容性表得到可供血血型
// 2. 拉取登记资格有效且血型相容的献血者
// 3. 联结联系资料,缺资料者剔除
// 4. 计算献血间隔资格 (从未献血视为合格)
// 5. 有申请方坐标时计算距离,否则距离未知 (None,不是 0)
// 6. 排序: 同型优先 → 距离近优先(未知排最后) → 末次献血越早越优先
// 7. 截断为 缓冲系数 × 需求单位数
// 红线: 只读; 依赖失败降级为"空结果 + 错误标志",不中断调用方
// ==========================================

use crate::config::BloodBankSettings;
use crate::domain::donor::{DonorContact, DonorProfile, GeoPoint};
use crate::domain::matching::{MatchOutcome, MatchedDonor};
use crate::domain::types::BloodType;
use crate::engine::clock::Clock;
use crate::engine::compatibility::{compatibility_score, compatible_donors, match_type};
use crate::engine::distance::distance_between;
use crate::engine::eligibility::evaluate_donation_interval;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::geolocation::GeolocationProvider;
use crate::repository::{DonorRepository, RepositoryResult};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::instrument;

/// 候选排序
///
/// 同型 → 距离升序(None 最后) → 末次献血日期升序(从未献血最先) → donor_id
pub fn compare_candidates(a: &MatchedDonor, b: &MatchedDonor) -> Ordering {
    a.match_type
        .cmp(&b.match_type)
        .then_with(|| compare_distance(a.distance_km, b.distance_km))
        .then_with(|| a.last_donation_date.cmp(&b.last_donation_date))
        .then_with(|| a.donor_id.cmp(&b.donor_id))
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// 候选上限 = 系数 × 需求单位数
pub fn candidate_limit(units_needed: u32, buffer_factor: u32) -> usize {
    units_needed.saturating_mul(buffer_factor.max(1)) as usize
}

/// 对已联结的候选计算距离/资格并排序截断（纯函数）
///
/// 不相容血型在此再次过滤,保证结果只含相容献血者
pub fn rank_candidates(
    recipient: BloodType,
    candidates: Vec<(DonorProfile, DonorContact)>,
    origin: Option<&GeoPoint>,
    geolocation: &dyn GeolocationProvider,
    today: NaiveDate,
    settings: &BloodBankSettings,
    limit: usize,
) -> Vec<MatchedDonor> {
    let mut ranked: Vec<MatchedDonor> = candidates
        .into_iter()
        .filter_map(|(donor, contact)| {
            let kind = match_type(donor.blood_type, recipient)?;
            let interval = evaluate_donation_interval(
                donor.last_donation_date,
                today,
                settings.donation_interval_days,
            );
            let distance_km = origin.and_then(|o| {
                geolocation
                    .locate(&contact, Some(o))
                    .map(|p| distance_between(o, &p))
            });

            let distance_label = distance_km
                .map(|d| format!("{:.1}km", d))
                .unwrap_or_else(|| "未知".to_string());
            let match_reason = format!(
                "{}|distance={}|interval={}",
                kind,
                distance_label,
                if interval.eligible { "OK" } else { "WAIT" }
            );

            Some(MatchedDonor {
                donor_id: donor.donor_id,
                full_name: contact.full_name,
                email: contact.email,
                phone: contact.phone,
                blood_type: donor.blood_type,
                match_type: kind,
                distance_km,
                last_donation_date: donor.last_donation_date,
                eligible_to_notify: interval.eligible,
                days_until_eligible: interval.days_until_eligible,
                score: compatibility_score(donor.blood_type, recipient),
                match_reason,
            })
        })
        .collect();

    ranked.sort_by(compare_candidates);
    ranked.truncate(limit);
    ranked
}

// ==========================================
// DonorMatcher - 献血者匹配器
// ==========================================
pub struct DonorMatcher {
    donor_repo: Arc<DonorRepository>,
    geolocation: Arc<dyn GeolocationProvider>,
    clock: Arc<dyn Clock>,
}

impl DonorMatcher {
    pub fn new(
        donor_repo: Arc<DonorRepository>,
        geolocation: Arc<dyn GeolocationProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            donor_repo,
            geolocation,
            clock,
        }
    }

    /// 查找匹配献血者
    ///
    /// # 返回
    /// - Ok(MatchOutcome): 正常结果; 无候选时为空列表(非错误)
    /// - Ok(MatchOutcome { error: Some(..) }): 数据访问失败降级
    /// - Err(Validation): units_needed 为 0
    #[instrument(skip(self, settings))]
    pub fn find_matching_donors(
        &self,
        blood_type: BloodType,
        location: Option<GeoPoint>,
        units_needed: u32,
        settings: &BloodBankSettings,
    ) -> EngineResult<MatchOutcome> {
        if units_needed == 0 {
            return Err(EngineError::Validation("需求单位数必须为正数".to_string()));
        }
        if let Some(p) = location {
            if !p.is_valid() {
                return Err(EngineError::Validation(format!(
                    "坐标越界: lat={}, lon={}",
                    p.latitude, p.longitude
                )));
            }
        }

        let candidates = match self.load_candidates(blood_type) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "献血者查询失败，匹配结果降级为空");
                return Ok(MatchOutcome::degraded(e.to_string()));
            }
        };

        let limit = candidate_limit(units_needed, settings.candidate_buffer_factor);
        let donors = rank_candidates(
            blood_type,
            candidates,
            location.as_ref(),
            self.geolocation.as_ref(),
            self.clock.today(),
            settings,
            limit,
        );

        tracing::info!(matched = donors.len(), limit, "献血者匹配完成");
        Ok(MatchOutcome::ok(donors))
    }

    /// 拉取相容血型献血者并联结联系资料
    fn load_candidates(
        &self,
        blood_type: BloodType,
    ) -> RepositoryResult<Vec<(DonorProfile, DonorContact)>> {
        self.donor_repo
            .find_eligible_candidates(compatible_donors(blood_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::MatchType;
    use crate::engine::geolocation::ProfileGeolocation;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
    }

    fn candidate(
        id: &str,
        bt: BloodType,
        last_days_ago: Option<i64>,
        location: Option<GeoPoint>,
    ) -> (DonorProfile, DonorContact) {
        let ts = today().and_hms_opt(0, 0, 0).unwrap();
        (
            DonorProfile {
                donor_id: id.to_string(),
                blood_type: bt,
                last_donation_date: last_days_ago.map(|d| today() - Duration::days(d)),
                eligible_to_donate: true,
                created_at: ts,
                updated_at: ts,
            },
            DonorContact {
                donor_id: id.to_string(),
                full_name: format!("Donor {}", id),
                email: Some(format!("{}@example.org", id.to_lowercase())),
                phone: None,
                city: None,
                location,
            },
        )
    }

    #[test]
    fn test_exact_before_compatible_then_distance() {
        let origin = GeoPoint::new(0.0, 0.0);
        let candidates = vec![
            candidate("FAR_EXACT", BloodType::APos, None, Some(GeoPoint::new(1.0, 0.0))),
            candidate("NEAR_O", BloodType::ONeg, None, Some(GeoPoint::new(0.01, 0.0))),
            candidate("NEAR_EXACT", BloodType::APos, None, Some(GeoPoint::new(0.1, 0.0))),
            candidate("UNKNOWN_EXACT", BloodType::APos, None, None),
        ];

        let ranked = rank_candidates(
            BloodType::APos,
            candidates,
            Some(&origin),
            &ProfileGeolocation,
            today(),
            &BloodBankSettings::default(),
            10,
        );

        let ids: Vec<_> = ranked.iter().map(|m| m.donor_id.as_str()).collect();
        assert_eq!(ids, vec!["NEAR_EXACT", "FAR_EXACT", "UNKNOWN_EXACT", "NEAR_O"]);
        assert_eq!(ranked[2].distance_km, None);
        assert_eq!(ranked[3].match_type, MatchType::Compatible);
        assert_eq!(ranked[3].score, 80);
    }

    #[test]
    fn test_oldest_donation_first_without_location() {
        let candidates = vec![
            candidate("RECENT", BloodType::BNeg, Some(60), None),
            candidate("NEVER", BloodType::BNeg, None, None),
            candidate("OLD", BloodType::BNeg, Some(400), None),
        ];

        let ranked = rank_candidates(
            BloodType::BNeg,
            candidates,
            None,
            &ProfileGeolocation,
            today(),
            &BloodBankSettings::default(),
            10,
        );
        let ids: Vec<_> = ranked.iter().map(|m| m.donor_id.as_str()).collect();
        assert_eq!(ids, vec!["NEVER", "OLD", "RECENT"]);
        assert!(ranked.iter().all(|m| m.distance_km.is_none()));
    }

    #[test]
    fn test_incompatible_filtered_and_eligibility_flag() {
        let candidates = vec![
            candidate("A_POS", BloodType::APos, None, None),
            candidate("O_NEG_RECENT", BloodType::ONeg, Some(10), None),
        ];

        let ranked = rank_candidates(
            BloodType::ONeg,
            candidates,
            None,
            &ProfileGeolocation,
            today(),
            &BloodBankSettings::default(),
            10,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].donor_id, "O_NEG_RECENT");
        assert!(!ranked[0].eligible_to_notify);
        assert_eq!(ranked[0].days_until_eligible, 46);
    }

    #[test]
    fn test_candidate_limit() {
        assert_eq!(candidate_limit(3, 2), 6);
        assert_eq!(candidate_limit(3, 0), 3);

        let candidates: Vec<_> = (0..10)
            .map(|i| candidate(&format!("D{}", i), BloodType::OPos, None, None))
            .collect();
        let ranked = rank_candidates(
            BloodType::OPos,
            candidates,
            None,
            &ProfileGeolocation,
            today(),
            &BloodBankSettings::default(),
            candidate_limit(2, 2),
        );
        assert_eq!(ranked.len(), 4);
    }
}
