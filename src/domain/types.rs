// ==========================================
// 血库管理核心 - 领域类型定义
// ==========================================
// 职责: 定义血型、批次状态、申请状态、优先级、紧急等级等闭合枚举
// 红线: 所有枚举均为闭合集合,未知值一律视为输入错误
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 血型 (Blood Type)
// ==========================================
// ABO + Rh, 共 8 种, 不可扩展
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APos,
    #[serde(rename = "A-")]
    ANeg,
    #[serde(rename = "B+")]
    BPos,
    #[serde(rename = "B-")]
    BNeg,
    #[serde(rename = "AB+")]
    ABPos,
    #[serde(rename = "AB-")]
    ABNeg,
    #[serde(rename = "O+")]
    OPos,
    #[serde(rename = "O-")]
    ONeg,
}

impl BloodType {
    /// 全部血型（固定顺序，用于遍历与锁分配）
    pub const ALL: [BloodType; 8] = [
        BloodType::APos,
        BloodType::ANeg,
        BloodType::BPos,
        BloodType::BNeg,
        BloodType::ABPos,
        BloodType::ABNeg,
        BloodType::OPos,
        BloodType::ONeg,
    ];

    /// 转换为数据库/展示字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::APos => "A+",
            BloodType::ANeg => "A-",
            BloodType::BPos => "B+",
            BloodType::BNeg => "B-",
            BloodType::ABPos => "AB+",
            BloodType::ABNeg => "AB-",
            BloodType::OPos => "O+",
            BloodType::ONeg => "O-",
        }
    }

    /// 从字符串解析血型
    ///
    /// 接受 "A+" / "a+" / " O- " 等写法，未知值返回 None
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase();
        BloodType::ALL
            .iter()
            .copied()
            .find(|bt| bt.as_str() == normalized)
    }

    /// 在 ALL 中的下标
    pub fn index(&self) -> usize {
        match self {
            BloodType::APos => 0,
            BloodType::ANeg => 1,
            BloodType::BPos => 2,
            BloodType::BNeg => 3,
            BloodType::ABPos => 4,
            BloodType::ABNeg => 5,
            BloodType::OPos => 6,
            BloodType::ONeg => 7,
        }
    }

    /// Rh 阳性
    pub fn is_rh_positive(&self) -> bool {
        matches!(
            self,
            BloodType::APos | BloodType::BPos | BloodType::ABPos | BloodType::OPos
        )
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 库存批次状态 (Batch Status)
// ==========================================
// 生命周期: AVAILABLE → USED (出库耗尽) | EXPIRED (过期清扫)
// RESERVED 为预留状态,当前流程不主动写入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Available, // 可用
    Reserved,  // 预留
    Used,      // 已用完
    Expired,   // 已过期
}

impl BatchStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            BatchStatus::Available => "AVAILABLE",
            BatchStatus::Reserved => "RESERVED",
            BatchStatus::Used => "USED",
            BatchStatus::Expired => "EXPIRED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "AVAILABLE" => Some(BatchStatus::Available),
            "RESERVED" => Some(BatchStatus::Reserved),
            "USED" => Some(BatchStatus::Used),
            "EXPIRED" => Some(BatchStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 用血申请状态 (Request Status)
// ==========================================
// 状态机:
//   PENDING → APPROVED (库存已扣减) | REJECTED | CANCELLED
//   APPROVED → FULFILLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Fulfilled,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Fulfilled => "FULFILLED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(RequestStatus::Pending),
            "APPROVED" => Some(RequestStatus::Approved),
            "FULFILLED" => Some(RequestStatus::Fulfilled),
            "REJECTED" => Some(RequestStatus::Rejected),
            "CANCELLED" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    /// 是否允许迁移到目标状态
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
                | (RequestStatus::Pending, RequestStatus::Cancelled)
                | (RequestStatus::Approved, RequestStatus::Fulfilled)
        )
    }

    /// 计入短期需求的状态（待审批 + 已批准）
    pub fn counts_as_demand(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Approved)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 申请优先级 (Request Priority)
// ==========================================
// 全系统唯一的优先级口径,顺序: Low < Medium < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl RequestPriority {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RequestPriority::Low => "LOW",
            RequestPriority::Medium => "MEDIUM",
            RequestPriority::High => "HIGH",
            RequestPriority::Critical => "CRITICAL",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Some(RequestPriority::Low),
            "MEDIUM" => Some(RequestPriority::Medium),
            "HIGH" => Some(RequestPriority::High),
            "CRITICAL" => Some(RequestPriority::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for RequestPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 需求紧急等级 (Urgency Level)
// ==========================================
// 由需求预测器输出,顺序: Low < Medium < High
// 红线: 等级制,不是评分制
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
}

impl UrgencyLevel {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Low => "LOW",
            UrgencyLevel::Medium => "MEDIUM",
            UrgencyLevel::High => "HIGH",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Some(UrgencyLevel::Low),
            "MEDIUM" => Some(UrgencyLevel::Medium),
            "HIGH" => Some(UrgencyLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 匹配类型 (Match Type)
// ==========================================
// 同型优先于相容型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Exact,      // 同型
    Compatible, // 相容但不同型
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Exact => write!(f, "EXACT"),
            MatchType::Compatible => write!(f, "COMPATIBLE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blood_type_parse() {
        assert_eq!(BloodType::parse("A+"), Some(BloodType::APos));
        assert_eq!(BloodType::parse(" ab- "), Some(BloodType::ABNeg));
        assert_eq!(BloodType::parse("o-"), Some(BloodType::ONeg));
        assert_eq!(BloodType::parse("C+"), None);
        assert_eq!(BloodType::parse(""), None);
    }

    #[test]
    fn test_blood_type_index_matches_all_order() {
        for (i, bt) in BloodType::ALL.iter().enumerate() {
            assert_eq!(bt.index(), i);
            assert_eq!(BloodType::parse(bt.as_str()), Some(*bt));
        }
    }

    #[test]
    fn test_blood_type_serde_uses_symbol() {
        let json = serde_json::to_string(&BloodType::ABPos).unwrap();
        assert_eq!(json, "\"AB+\"");
        let parsed: BloodType = serde_json::from_str("\"O-\"").unwrap();
        assert_eq!(parsed, BloodType::ONeg);
    }

    #[test]
    fn test_request_status_transitions() {
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Approved));
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Rejected));
        assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Cancelled));
        assert!(RequestStatus::Approved.can_transition_to(RequestStatus::Fulfilled));

        assert!(!RequestStatus::Approved.can_transition_to(RequestStatus::Rejected));
        assert!(!RequestStatus::Rejected.can_transition_to(RequestStatus::Approved));
        assert!(!RequestStatus::Fulfilled.can_transition_to(RequestStatus::Pending));
        assert!(!RequestStatus::Pending.can_transition_to(RequestStatus::Fulfilled));
    }

    #[test]
    fn test_priority_order() {
        assert!(RequestPriority::Critical > RequestPriority::High);
        assert!(RequestPriority::High > RequestPriority::Medium);
        assert!(RequestPriority::Medium > RequestPriority::Low);
        assert_eq!(RequestPriority::from_db_str("urgent"), None);
    }
}
