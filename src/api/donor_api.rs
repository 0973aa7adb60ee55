// ==========================================
// 血库管理核心 - 献血者 API
// ==========================================
// 职责: 献血者登记、资料/资格维护、详情查询
// 约束: 校验先于写入; 写入与操作日志同一事务
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator;
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::donor::{DonorContact, DonorProfile, GeoPoint, NewDonor};
use crate::engine::clock::Clock;
use crate::engine::eligibility::{
    evaluate_donation_interval, next_eligible_date, DonationEligibility,
};
use crate::engine::repositories::BloodBankRepositories;
use crate::repository::{ActionLogRepository, DonorRepository, RepositoryError};

// ==========================================
// DonorDetail - 献血者详情
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorDetail {
    pub profile: DonorProfile,
    pub contact: Option<DonorContact>,
    pub interval: DonationEligibility,
    pub next_eligible_date: Option<NaiveDate>,
}

// ==========================================
// DonorApi - 献血者 API
// ==========================================
pub struct DonorApi {
    repos: BloodBankRepositories,
    config: Arc<ConfigManager>,
    clock: Arc<dyn Clock>,
}

impl DonorApi {
    pub fn new(
        repos: BloodBankRepositories,
        config: Arc<ConfigManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            config,
            clock,
        }
    }

    /// 登记献血者
    ///
    /// # 校验
    /// - 姓名非空、血型合法、邮箱格式、坐标范围
    /// - 末次献血日期不能晚于今天
    #[instrument(skip(self, input), fields(blood_type = %input.blood_type))]
    pub fn register_donor(&self, input: NewDonor, actor: &str) -> ApiResult<DonorProfile> {
        let full_name = validator::validate_name("姓名", &input.full_name)?;
        let blood_type = validator::parse_blood_type(&input.blood_type)?;
        let email = validator::validate_email(input.email.as_deref())?;
        let location = validator::validate_location(input.location)?;

        let today = self.clock.today();
        if let Some(last) = input.last_donation_date {
            if last > today {
                return Err(ApiError::ValidationError(format!(
                    "末次献血日期 {} 晚于今天 {}",
                    last, today
                )));
            }
        }

        let now = self.clock.now();
        let donor_id = Uuid::new_v4().to_string();
        let profile = DonorProfile {
            donor_id: donor_id.clone(),
            blood_type,
            last_donation_date: input.last_donation_date,
            eligible_to_donate: true,
            created_at: now,
            updated_at: now,
        };
        let contact = DonorContact {
            donor_id: donor_id.clone(),
            full_name,
            email,
            phone: validator::normalize_optional(input.phone.as_deref()),
            city: validator::normalize_optional(input.city.as_deref()),
            location,
        };

        self.repos
            .uow
            .run(|tx| -> ApiResult<()> {
                DonorRepository::insert_in(tx, &profile, &contact)?;
                let log = ActionLog::new(ActionType::RegisterDonor, actor, now)
                    .with_entity(donor_id.clone())
                    .with_blood_type(blood_type.as_str())
                    .with_payload(json!({
                        "has_location": contact.location.is_some(),
                        "last_donation_date": profile.last_donation_date,
                    }));
                ActionLogRepository::insert_in(tx, &log)?;
                Ok(())
            })
            .map_err(|e| e.on_write("register_donor"))?;

        tracing::info!(donor_id = %donor_id, "献血者已登记");
        Ok(profile)
    }

    /// 更新献血者坐标; None 清除坐标
    #[instrument(skip(self))]
    pub fn update_donor_location(
        &self,
        donor_id: &str,
        location: Option<GeoPoint>,
        actor: &str,
    ) -> ApiResult<()> {
        let location = validator::validate_location(location)?;
        let now = self.clock.now();

        self.repos
            .uow
            .run(|tx| -> ApiResult<()> {
                DonorRepository::update_location_in(tx, donor_id, location)?;
                let log = ActionLog::new(ActionType::UpdateDonor, actor, now)
                    .with_entity(donor_id)
                    .with_payload(json!({ "location": location }));
                ActionLogRepository::insert_in(tx, &log)?;
                Ok(())
            })
            .map_err(|e| e.on_write("update_donor_location"))
    }

    /// 设置登记资格（暂缓/恢复）
    #[instrument(skip(self))]
    pub fn set_donor_eligibility(
        &self,
        donor_id: &str,
        eligible_to_donate: bool,
        reason: Option<&str>,
        actor: &str,
    ) -> ApiResult<()> {
        let reason = validator::normalize_optional(reason);
        if !eligible_to_donate && reason.is_none() {
            return Err(ApiError::ValidationError("暂缓献血必须填写原因".to_string()));
        }
        let now = self.clock.now();

        self.repos
            .uow
            .run(|tx| -> ApiResult<()> {
                DonorRepository::update_eligibility_in(tx, donor_id, eligible_to_donate, now)?;
                let mut log = ActionLog::new(ActionType::UpdateDonor, actor, now)
                    .with_entity(donor_id)
                    .with_payload(json!({ "eligible_to_donate": eligible_to_donate }));
                if let Some(r) = &reason {
                    log = log.with_detail(r.clone());
                }
                ActionLogRepository::insert_in(tx, &log)?;
                Ok(())
            })
            .map_err(|e| e.on_write("set_donor_eligibility"))?;

        tracing::info!(eligible_to_donate, "献血者资格已更新");
        Ok(())
    }

    /// 献血者详情（含间隔资格）
    pub fn get_donor(&self, donor_id: &str) -> ApiResult<DonorDetail> {
        let profile = self
            .repos
            .donor_repo
            .find_by_id(donor_id)?
            .ok_or_else(|| RepositoryError::not_found("Donor", donor_id))?;
        let contact = self.repos.donor_repo.find_contact(donor_id)?;

        let interval_days = self.config.get_donation_interval_days()?;
        let interval = evaluate_donation_interval(
            profile.last_donation_date,
            self.clock.today(),
            interval_days,
        );

        let next_eligible_date = next_eligible_date(profile.last_donation_date, interval_days)?;

        Ok(DonorDetail {
            next_eligible_date,
            profile,
            contact,
            interval,
        })
    }
}
