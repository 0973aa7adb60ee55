// ==========================================
// 血库管理核心 - ABO/Rh 相容性表
// ==========================================
// 职责: 受血血型 → 可供血血型集合 (静态查表)
// 红线: 8 值全域上的全函数,无错误分支
// 规则: O- 可供所有血型; AB+ 可受所有血型;
//       Rh- 受血者只能接受 Rh- 供血
// ==========================================

use crate::domain::types::{BloodType, MatchType};

use BloodType::*;

const FOR_O_NEG: [BloodType; 1] = [ONeg];
const FOR_O_POS: [BloodType; 2] = [OPos, ONeg];
const FOR_A_NEG: [BloodType; 2] = [ANeg, ONeg];
const FOR_A_POS: [BloodType; 4] = [APos, ANeg, OPos, ONeg];
const FOR_B_NEG: [BloodType; 2] = [BNeg, ONeg];
const FOR_B_POS: [BloodType; 4] = [BPos, BNeg, OPos, ONeg];
const FOR_AB_NEG: [BloodType; 4] = [ABNeg, ANeg, BNeg, ONeg];
const FOR_AB_POS: [BloodType; 8] = [ABPos, ABNeg, APos, ANeg, BPos, BNeg, OPos, ONeg];

/// 可向 requested 供血的血型（首项为同型）
pub fn compatible_donors(requested: BloodType) -> &'static [BloodType] {
    match requested {
        ONeg => &FOR_O_NEG,
        OPos => &FOR_O_POS,
        ANeg => &FOR_A_NEG,
        APos => &FOR_A_POS,
        BNeg => &FOR_B_NEG,
        BPos => &FOR_B_POS,
        ABNeg => &FOR_AB_NEG,
        ABPos => &FOR_AB_POS,
    }
}

/// donor 是否可向 recipient 供血
pub fn can_donate_to(donor: BloodType, recipient: BloodType) -> bool {
    compatible_donors(recipient).contains(&donor)
}

/// 匹配类型: 同型 / 相容; 不相容返回 None
pub fn match_type(donor: BloodType, recipient: BloodType) -> Option<MatchType> {
    if donor == recipient {
        Some(MatchType::Exact)
    } else if can_donate_to(donor, recipient) {
        Some(MatchType::Compatible)
    } else {
        None
    }
}

/// 相容性评分: 同型 100, 相容 80, 不相容 0
pub fn compatibility_score(donor: BloodType, recipient: BloodType) -> u32 {
    match match_type(donor, recipient) {
        Some(MatchType::Exact) => 100,
        Some(MatchType::Compatible) => 80,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_o_neg_is_universal_donor() {
        for recipient in BloodType::ALL {
            assert!(compatible_donors(recipient).contains(&ONeg), "{}", recipient);
        }
    }

    #[test]
    fn test_ab_pos_receives_from_all() {
        let donors = compatible_donors(ABPos);
        assert_eq!(donors.len(), 8);
        for bt in BloodType::ALL {
            assert!(donors.contains(&bt));
        }
    }

    #[test]
    fn test_exact_type_listed_first() {
        for recipient in BloodType::ALL {
            assert_eq!(compatible_donors(recipient)[0], recipient);
        }
    }

    #[test]
    fn test_matrix_matches_abo_rh_rules() {
        // 抗原规则: 供血者的 A/B/Rh 抗原必须是受血者抗原的子集
        fn antigens(bt: BloodType) -> (bool, bool, bool) {
            match bt {
                APos => (true, false, true),
                ANeg => (true, false, false),
                BPos => (false, true, true),
                BNeg => (false, true, false),
                ABPos => (true, true, true),
                ABNeg => (true, true, false),
                OPos => (false, false, true),
                ONeg => (false, false, false),
            }
        }

        for recipient in BloodType::ALL {
            for donor in BloodType::ALL {
                let (da, db, dr) = antigens(donor);
                let (ra, rb, rr) = antigens(recipient);
                let expected = (!da || ra) && (!db || rb) && (!dr || rr);
                assert_eq!(
                    can_donate_to(donor, recipient),
                    expected,
                    "donor={} recipient={}",
                    donor,
                    recipient
                );
            }
        }
    }

    #[test]
    fn test_rh_negative_recipient_rejects_rh_positive() {
        assert!(!can_donate_to(OPos, ONeg));
        assert!(!can_donate_to(APos, ABNeg));
        assert_eq!(match_type(APos, ABNeg), None);
        assert_eq!(compatibility_score(APos, ABNeg), 0);
    }

    #[test]
    fn test_scores() {
        assert_eq!(compatibility_score(BPos, BPos), 100);
        assert_eq!(compatibility_score(ONeg, BPos), 80);
    }
}
