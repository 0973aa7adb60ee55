// ==========================================
// 血库管理核心 - 献血者匹配 API
// ==========================================
// 职责: 候选献血者查询、按申请招募献血者
// 说明: 匹配为只读操作,可并发; 依赖失败降级为空结果 + 错误标志
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator;
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::donor::GeoPoint;
use crate::domain::matching::MatchOutcome;
use crate::domain::types::BloodType;
use crate::engine::clock::Clock;
use crate::engine::donor_matcher::DonorMatcher;
use crate::engine::notification::{
    DispatchReport, NotificationDispatcher, NotificationEvent, Recipient,
};
use crate::engine::repositories::BloodBankRepositories;
use crate::repository::RepositoryError;

/// 招募通知结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorOutreachSummary {
    pub request_id: String,
    pub outcome: MatchOutcome,
    /// 满足献血间隔、已发送通知的献血者数
    pub notified: usize,
    /// 未满献血间隔而跳过的献血者数
    pub skipped_not_eligible: usize,
    pub report: Option<DispatchReport>,
}

// ==========================================
// MatchingApi - 献血者匹配 API
// ==========================================
pub struct MatchingApi {
    repos: BloodBankRepositories,
    config: Arc<ConfigManager>,
    matcher: Arc<DonorMatcher>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl MatchingApi {
    pub fn new(
        repos: BloodBankRepositories,
        config: Arc<ConfigManager>,
        matcher: Arc<DonorMatcher>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            config,
            matcher,
            dispatcher,
            clock,
        }
    }

    /// 查找匹配献血者
    ///
    /// # 返回
    /// - 空列表是合法结果; `outcome.error` 非空表示依赖失败降级
    pub fn find_matching_donors(
        &self,
        blood_type: &str,
        location: Option<GeoPoint>,
        units_needed: i64,
    ) -> ApiResult<MatchOutcome> {
        let blood_type = validator::parse_blood_type(blood_type)?;
        let units_needed = validator::validate_units(units_needed)?;
        let location = validator::validate_location(location)?;
        self.match_for(blood_type, location, units_needed)
    }

    /// 为申请招募献血者: 匹配后仅通知满足献血间隔的候选
    #[instrument(skip(self))]
    pub async fn notify_matching_donors(
        &self,
        request_id: &str,
        location: Option<GeoPoint>,
        actor: &str,
    ) -> ApiResult<DonorOutreachSummary> {
        let location = validator::validate_location(location)?;
        let request = self
            .repos
            .request_repo
            .find_by_id(request_id)?
            .ok_or_else(|| RepositoryError::not_found("BloodRequest", request_id))?;

        if !request.status.counts_as_demand() {
            return Err(ApiError::ValidationError(format!(
                "申请 {} 状态为 {}，无需招募献血者",
                request_id, request.status
            )));
        }

        let outcome = self.match_for(request.blood_type, location, request.units_requested)?;

        let (eligible, waiting): (Vec<_>, Vec<_>) =
            outcome.donors.iter().partition(|d| d.eligible_to_notify);
        let recipients: Vec<Recipient> = eligible
            .iter()
            .map(|d| Recipient::new(d.full_name.clone(), d.email.clone(), d.phone.clone()))
            .collect();

        let report = if recipients.is_empty() {
            None
        } else {
            let event = NotificationEvent::DonorMatch {
                request_id: request.request_id.clone(),
                hospital_name: request.hospital_name.clone(),
                blood_type: request.blood_type,
                units_needed: request.units_requested,
            };
            Some(
                self.dispatcher
                    .notify_event(&recipients, &event, &json!({ "request_id": request_id }))
                    .await,
            )
        };

        let notified = recipients.len();
        let log = ActionLog::new(ActionType::NotifyDonors, actor, self.clock.now())
            .with_entity(request_id)
            .with_blood_type(request.blood_type.as_str())
            .with_payload(json!({
                "donor_ids": eligible.iter().map(|d| d.donor_id.as_str()).collect::<Vec<_>>(),
                "skipped_not_eligible": waiting.len(),
                "delivered": report.as_ref().map(|r| r.delivered),
                "degraded": outcome.is_degraded(),
            }));
        // 通知已发出,审计写入失败只告警
        if let Err(e) = self.repos.action_log_repo.insert(&log) {
            tracing::warn!(error = %e, "招募通知审计写入失败");
        }

        tracing::info!(notified, skipped = waiting.len(), "献血者招募通知完成");
        let skipped_not_eligible = waiting.len();
        Ok(DonorOutreachSummary {
            request_id: request_id.to_string(),
            outcome,
            notified,
            skipped_not_eligible,
            report,
        })
    }

    fn match_for(
        &self,
        blood_type: BloodType,
        location: Option<GeoPoint>,
        units_needed: u32,
    ) -> ApiResult<MatchOutcome> {
        let settings = match self.config.load_settings() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "读取配置失败，匹配结果降级为空");
                return Ok(MatchOutcome::degraded(e.to_string()));
            }
        };

        Ok(self
            .matcher
            .find_matching_donors(blood_type, location, units_needed, &settings)?)
    }
}
