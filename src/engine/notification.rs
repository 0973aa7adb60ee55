// ==========================================
// 血库管理核心 - 通知分发
// ==========================================
// 职责: 定义通知服务 trait,按事件格式化主题/正文并发送
// 说明: Engine 层定义 trait,外部投递渠道(邮件/短信)实现适配器
// 红线: 通知是尽力而为,失败只记录日志,永不回滚台账/预测状态
// ==========================================

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::error::Error;
use std::sync::Arc;

use crate::domain::types::BloodType;

pub type NotificationResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// Recipient - 收件人
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Recipient {
    pub fn new(name: impl Into<String>, email: Option<String>, phone: Option<String>) -> Self {
        Self {
            name: name.into(),
            email,
            phone,
        }
    }

    /// 至少有一个可投递渠道
    pub fn is_reachable(&self) -> bool {
        let non_empty = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());
        non_empty(&self.email) || non_empty(&self.phone)
    }
}

// ==========================================
// 通知服务 Trait
// ==========================================

/// 通知服务
///
/// # 返回
/// - `Ok(true)`: 已投递
/// - `Ok(false)`: 服务可达但未投递
/// - `Err`: 服务不可达
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(
        &self,
        recipient: &Recipient,
        subject: &str,
        body: &str,
    ) -> NotificationResult<bool>;

    /// 批量发送; 默认并发逐个发送,全部成功才返回 true
    async fn send_bulk(
        &self,
        recipients: &[Recipient],
        subject: &str,
        body: &str,
    ) -> NotificationResult<bool> {
        let results = join_all(recipients.iter().map(|r| self.send(r, subject, body))).await;
        let mut all_ok = true;
        for result in results {
            all_ok &= result?;
        }
        Ok(all_ok)
    }
}

/// 日志通知服务（模拟投递）
///
/// 未接入真实渠道时使用,只写日志
#[derive(Debug, Clone, Default)]
pub struct LoggingNotificationService;

#[async_trait]
impl NotificationService for LoggingNotificationService {
    async fn send(
        &self,
        recipient: &Recipient,
        subject: &str,
        body: &str,
    ) -> NotificationResult<bool> {
        tracing::info!(
            recipient = %recipient.name,
            email = recipient.email.as_deref().unwrap_or("-"),
            subject,
            body_len = body.len(),
            "模拟发送通知"
        );
        Ok(true)
    }
}

// ==========================================
// 通知事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationEvent {
    /// 请候选献血者献血
    DonorMatch {
        request_id: String,
        hospital_name: String,
        blood_type: BloodType,
        units_needed: u32,
    },
    /// 申请已批准（通知医院）
    RequestApproved {
        request_id: String,
        hospital_name: String,
        blood_type: BloodType,
        units: u32,
    },
    /// 申请被驳回（通知医院）
    RequestRejected {
        request_id: String,
        hospital_name: String,
        reason: Option<String>,
    },
    /// 库存告急
    LowStockAlert {
        blood_type: BloodType,
        current_stock: u32,
        short_term_demand: u32,
    },
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::DonorMatch { .. } => "DonorMatch",
            NotificationEvent::RequestApproved { .. } => "RequestApproved",
            NotificationEvent::RequestRejected { .. } => "RequestRejected",
            NotificationEvent::LowStockAlert { .. } => "LowStockAlert",
        }
    }

    /// 主题与正文
    pub fn render(&self) -> (String, String) {
        match self {
            NotificationEvent::DonorMatch {
                request_id,
                hospital_name,
                blood_type,
                units_needed,
            } => (
                format!("Urgent: {} blood donors needed", blood_type),
                format!(
                    "{} needs {} unit(s) of {} blood (request {}). \
                     Your blood type is compatible. Please reply if you can donate.",
                    hospital_name, units_needed, blood_type, request_id
                ),
            ),
            NotificationEvent::RequestApproved {
                request_id,
                hospital_name,
                blood_type,
                units,
            } => (
                format!("Blood request {} approved", request_id),
                format!(
                    "Dear {}, your request for {} unit(s) of {} has been approved and reserved from inventory.",
                    hospital_name, units, blood_type
                ),
            ),
            NotificationEvent::RequestRejected {
                request_id,
                hospital_name,
                reason,
            } => (
                format!("Blood request {} rejected", request_id),
                format!(
                    "Dear {}, your request {} could not be approved. Reason: {}",
                    hospital_name,
                    request_id,
                    reason.as_deref().unwrap_or("not specified")
                ),
            ),
            NotificationEvent::LowStockAlert {
                blood_type,
                current_stock,
                short_term_demand,
            } => (
                format!("Low stock alert: {}", blood_type),
                format!(
                    "{} stock is {} unit(s) against {} unit(s) of open demand.",
                    blood_type, current_stock, short_term_demand
                ),
            ),
        }
    }
}

// ==========================================
// 分发结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub event: String,
    pub attempted: usize,
    pub skipped_unreachable: usize,
    pub delivered: bool,
    pub error: Option<String>,
}

// ==========================================
// NotificationDispatcher - 通知分发器
// ==========================================
#[derive(Clone)]
pub struct NotificationDispatcher {
    service: Arc<dyn NotificationService>,
}

impl NotificationDispatcher {
    pub fn new(service: Arc<dyn NotificationService>) -> Self {
        Self { service }
    }

    /// 发送通知（主题/正文由调用方给出）
    ///
    /// 失败不返回 Err,记录在 DispatchReport 中
    pub async fn notify(
        &self,
        recipients: &[Recipient],
        subject: &str,
        message: &str,
        event: &str,
        metadata: &JsonValue,
    ) -> DispatchReport {
        let reachable: Vec<Recipient> = recipients
            .iter()
            .filter(|r| r.is_reachable())
            .cloned()
            .collect();
        let mut report = DispatchReport {
            event: event.to_string(),
            attempted: reachable.len(),
            skipped_unreachable: recipients.len() - reachable.len(),
            delivered: false,
            error: None,
        };

        if reachable.is_empty() {
            tracing::debug!(event, "无可投递收件人，跳过通知");
            return report;
        }

        let outcome = if reachable.len() == 1 {
            self.service.send(&reachable[0], subject, message).await
        } else {
            self.service.send_bulk(&reachable, subject, message).await
        };

        match outcome {
            Ok(delivered) => {
                report.delivered = delivered;
                if !delivered {
                    tracing::warn!(event, %metadata, "通知服务未确认投递");
                }
            }
            Err(e) => {
                tracing::warn!(event, %metadata, error = %e, "通知发送失败（已忽略）");
                report.error = Some(e.to_string());
            }
        }
        report
    }

    /// 按事件模板发送
    pub async fn notify_event(
        &self,
        recipients: &[Recipient],
        event: &NotificationEvent,
        metadata: &JsonValue,
    ) -> DispatchReport {
        let (subject, body) = event.render();
        self.notify(recipients, &subject, &body, event.as_str(), metadata)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingService {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationService for RecordingService {
        async fn send(
            &self,
            recipient: &Recipient,
            subject: &str,
            _body: &str,
        ) -> NotificationResult<bool> {
            self.sent
                .lock()
                .unwrap()
                .push(format!("{}:{}", recipient.name, subject));
            Ok(true)
        }
    }

    struct FailingService;

    #[async_trait]
    impl NotificationService for FailingService {
        async fn send(
            &self,
            _recipient: &Recipient,
            _subject: &str,
            _body: &str,
        ) -> NotificationResult<bool> {
            Err("smtp unreachable".into())
        }
    }

    fn recipients() -> Vec<Recipient> {
        vec![
            Recipient::new("Alice", Some("alice@example.org".to_string()), None),
            Recipient::new("Bob", None, Some("555-0100".to_string())),
            Recipient::new("Nobody", None, Some("  ".to_string())),
        ]
    }

    #[tokio::test]
    async fn test_bulk_skips_unreachable() {
        let service = Arc::new(RecordingService::default());
        let dispatcher = NotificationDispatcher::new(service.clone());

        let event = NotificationEvent::LowStockAlert {
            blood_type: BloodType::ONeg,
            current_stock: 2,
            short_term_demand: 7,
        };
        let report = dispatcher.notify_event(&recipients(), &event, &json!({})).await;

        assert!(report.delivered);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.skipped_unreachable, 1);
        assert_eq!(report.event, "LowStockAlert");

        let sent = service.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("Low stock alert: O-"));
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let dispatcher = NotificationDispatcher::new(Arc::new(FailingService));
        let report = dispatcher
            .notify(&recipients()[..1], "s", "b", "Test", &json!({"k": 1}))
            .await;

        assert!(!report.delivered);
        assert_eq!(report.error.as_deref(), Some("smtp unreachable"));
    }

    #[test]
    fn test_render_rejected_without_reason() {
        let (subject, body) = NotificationEvent::RequestRejected {
            request_id: "R-1".to_string(),
            hospital_name: "City Hospital".to_string(),
            reason: None,
        }
        .render();
        assert_eq!(subject, "Blood request R-1 rejected");
        assert!(body.contains("not specified"));
    }
}
