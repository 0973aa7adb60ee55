// ==========================================
// 血库管理核心 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录,且与写入处于同一事务
// 用途: 审计追踪
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
// 对齐: action_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub action_type: String,            // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub entity_id: Option<String>,      // 关联实体 (申请/献血者/批次)
    pub blood_type: Option<String>,
    pub payload_json: Option<JsonValue>, // 操作参数/结果
    pub detail: Option<String>,
}

impl ActionLog {
    /// 构造一条新日志 (action_id 自动生成)
    pub fn new(action_type: ActionType, actor: &str, action_ts: NaiveDateTime) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts,
            actor: actor.to_string(),
            entity_id: None,
            blood_type: None,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_blood_type(mut self, blood_type: impl Into<String>) -> Self {
        self.blood_type = Some(blood_type.into());
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    RegisterDonor,    // 登记献血者
    UpdateDonor,      // 更新献血者资料/资格
    RecordDonation,   // 登记献血入库
    DeductInventory,  // 库存出库扣减
    ExpireBatches,    // 过期批次清扫
    CreateRequest,    // 创建用血申请
    ApproveRequest,   // 批准申请 (含扣减)
    RejectRequest,    // 驳回申请
    FulfillRequest,   // 申请完成
    CancelRequest,    // 撤销申请
    NotifyDonors,     // 通知候选献血者
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::RegisterDonor => "RegisterDonor",
            ActionType::UpdateDonor => "UpdateDonor",
            ActionType::RecordDonation => "RecordDonation",
            ActionType::DeductInventory => "DeductInventory",
            ActionType::ExpireBatches => "ExpireBatches",
            ActionType::CreateRequest => "CreateRequest",
            ActionType::ApproveRequest => "ApproveRequest",
            ActionType::RejectRequest => "RejectRequest",
            ActionType::FulfillRequest => "FulfillRequest",
            ActionType::CancelRequest => "CancelRequest",
            ActionType::NotifyDonors => "NotifyDonors",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_log_builder() {
        let ts = chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let log = ActionLog::new(ActionType::ApproveRequest, "operator", ts)
            .with_entity("REQ-1")
            .with_blood_type("O-")
            .with_detail("approved");

        assert_eq!(log.action_type, "ApproveRequest");
        assert_eq!(log.entity_id.as_deref(), Some("REQ-1"));
        assert_eq!(log.blood_type.as_deref(), Some("O-"));
        assert!(!log.action_id.is_empty());
    }
}
