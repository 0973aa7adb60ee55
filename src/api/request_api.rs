// ==========================================
// 血库管理核心 - 用血申请 API
// ==========================================
// 职责: 申请创建、审批(含出库扣减)、驳回、完成、撤销、查询
// 状态机: PENDING → APPROVED | REJECTED | CANCELLED; APPROVED → FULFILLED
// 审批流程 (saga):
// 1. 获取血型锁
// 2. 事务{ 状态/版本复核 → 先到期先出扣减 → PENDING→APPROVED → 操作日志 }
// 3. 释放锁后重算需求预测 (失败仅告警)
// 4. 通知医院 (尽力而为)
// 红线: 扣减与状态变更同事务,任何一步失败整体回滚,不存在"已批准未扣减"
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::forecast::DemandForecast;
use crate::domain::inventory::DeductionReceipt;
use crate::domain::request::{BloodRequest, NewBloodRequest};
use crate::domain::types::RequestStatus;
use crate::engine::clock::Clock;
use crate::engine::demand_forecaster::DemandForecaster;
use crate::engine::inventory_ledger::InventoryLedger;
use crate::engine::locks::BloodTypeLocks;
use crate::engine::notification::{
    DispatchReport, NotificationDispatcher, NotificationEvent, Recipient,
};
use crate::engine::repositories::BloodBankRepositories;
use crate::repository::{ActionLogRepository, BloodRequestRepository, RepositoryError};
use rusqlite::Connection;

// ==========================================
// ApprovalOutcome - 审批结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub request: BloodRequest,
    pub receipt: DeductionReceipt,
    /// 重算失败时为 None（预测是参考信号,不影响审批结果）
    pub forecast: Option<DemandForecast>,
    /// 未配置联系邮箱时为 None
    pub notification: Option<DispatchReport>,
}

// ==========================================
// RequestApi - 用血申请 API
// ==========================================
pub struct RequestApi {
    repos: BloodBankRepositories,
    forecaster: Arc<DemandForecaster>,
    dispatcher: Arc<NotificationDispatcher>,
    locks: Arc<BloodTypeLocks>,
    clock: Arc<dyn Clock>,
}

impl RequestApi {
    pub fn new(
        repos: BloodBankRepositories,
        forecaster: Arc<DemandForecaster>,
        dispatcher: Arc<NotificationDispatcher>,
        locks: Arc<BloodTypeLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            forecaster,
            dispatcher,
            locks,
            clock,
        }
    }

    // ==========================================
    // 写入接口
    // ==========================================

    /// 创建用血申请（PENDING）
    #[instrument(skip(self, input), fields(hospital = %input.hospital_name))]
    pub fn create_request(&self, input: NewBloodRequest, actor: &str) -> ApiResult<BloodRequest> {
        let hospital_name = validator::validate_name("医院名称", &input.hospital_name)?;
        let blood_type = validator::parse_blood_type(&input.blood_type)?;
        let units_requested = validator::validate_units(input.units_requested)?;
        let priority = validator::parse_priority(&input.priority)?;
        let contact_email = validator::validate_email(input.contact_email.as_deref())?;

        let now = self.clock.now();
        let request = BloodRequest {
            request_id: Uuid::new_v4().to_string(),
            hospital_name,
            contact_email,
            blood_type,
            units_requested,
            priority,
            status: RequestStatus::Pending,
            notes: validator::normalize_optional(input.notes.as_deref()),
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        self.repos
            .uow
            .run(|tx| -> ApiResult<()> {
                BloodRequestRepository::insert_in(tx, &request)?;
                let log = ActionLog::new(ActionType::CreateRequest, actor, now)
                    .with_entity(request.request_id.clone())
                    .with_blood_type(blood_type.as_str())
                    .with_payload(json!({
                        "units": units_requested,
                        "priority": priority,
                    }));
                ActionLogRepository::insert_in(tx, &log)?;
                Ok(())
            })
            .map_err(|e| e.on_write("create_request"))?;

        tracing::info!(request_id = %request.request_id, "用血申请已创建");
        self.forecaster.refresh(blood_type);
        Ok(request)
    }

    /// 批准申请并按先到期先出扣减库存
    ///
    /// # 参数
    /// - expected_revision: 调用方读到的 revision; Some 时不一致即拒绝
    ///
    /// # 错误
    /// - `InsufficientStock`: 可用量不足,申请保持 PENDING,库存不变
    /// - `InvalidStateTransition`: 申请不处于 PENDING
    /// - `ConcurrentModification`: 申请或批次已被其他操作修改
    /// - `DependencyFailure { unconfirmed: true }`: 数据库故障,重试前需重新查询申请状态与可用量
    pub async fn approve_request(
        &self,
        request_id: &str,
        expected_revision: Option<i32>,
        actor: &str,
    ) -> ApiResult<ApprovalOutcome> {
        let (request, receipt) = self.approve_locked(request_id, expected_revision, actor)?;

        let forecast = self.forecaster.refresh(request.blood_type);

        let notification = if request.contact_email.is_some() {
            let event = NotificationEvent::RequestApproved {
                request_id: request.request_id.clone(),
                hospital_name: request.hospital_name.clone(),
                blood_type: request.blood_type,
                units: request.units_requested,
            };
            Some(
                self.dispatcher
                    .notify_event(
                        &[hospital_recipient(&request)],
                        &event,
                        &json!({ "request_id": request.request_id }),
                    )
                    .await,
            )
        } else {
            None
        };

        Ok(ApprovalOutcome {
            request,
            receipt,
            forecast,
            notification,
        })
    }

    /// 审批的加锁事务段（同步,锁不跨 await）
    #[instrument(skip(self))]
    fn approve_locked(
        &self,
        request_id: &str,
        expected_revision: Option<i32>,
        actor: &str,
    ) -> ApiResult<(BloodRequest, DeductionReceipt)> {
        // 先读一次以确定血型（锁粒度）
        let snapshot = self.load_request(request_id)?;
        let _guard = self.locks.acquire(snapshot.blood_type)?;

        let today = self.clock.today();
        let now = self.clock.now();

        let result = self.repos.uow.run(|tx| -> ApiResult<(BloodRequest, DeductionReceipt)> {
            let current = load_request_in(tx, request_id)?;
            check_transition(&current, RequestStatus::Approved)?;
            if let Some(expected) = expected_revision {
                if expected != current.revision {
                    return Err(ApiError::ConcurrentModification(format!(
                        "申请 {} 已被修改（期望revision={}，实际revision={}）",
                        request_id, expected, current.revision
                    )));
                }
            }

            let receipt = InventoryLedger::deduct_in(
                tx,
                current.blood_type,
                current.units_requested,
                today,
                now,
            )?;
            let revision = BloodRequestRepository::update_status_in(
                tx,
                request_id,
                current.revision,
                RequestStatus::Approved,
                now,
            )?;

            let log = ActionLog::new(ActionType::ApproveRequest, actor, now)
                .with_entity(request_id)
                .with_blood_type(current.blood_type.as_str())
                .with_payload(json!({
                    "units": current.units_requested,
                    "deductions": &receipt.deductions,
                }));
            ActionLogRepository::insert_in(tx, &log)?;

            let approved = BloodRequest {
                status: RequestStatus::Approved,
                revision,
                updated_at: now,
                ..current
            };
            Ok((approved, receipt))
        });

        match result {
            Ok((request, receipt)) => {
                tracing::info!(
                    units = request.units_requested,
                    batches_touched = receipt.deductions.len(),
                    "申请已批准，库存已扣减"
                );
                Ok((request, receipt))
            }
            Err(e) => {
                tracing::warn!(error = %e, "申请未批准");
                Err(e.on_write("approve_request"))
            }
        }
    }

    /// 驳回申请（PENDING → REJECTED）并通知医院
    pub async fn reject_request(
        &self,
        request_id: &str,
        reason: Option<&str>,
        actor: &str,
    ) -> ApiResult<BloodRequest> {
        let reason = validator::normalize_optional(reason);
        let request = self.transition(
            request_id,
            RequestStatus::Rejected,
            ActionType::RejectRequest,
            reason.clone(),
            actor,
        )?;
        self.forecaster.refresh(request.blood_type);

        if request.contact_email.is_some() {
            let event = NotificationEvent::RequestRejected {
                request_id: request.request_id.clone(),
                hospital_name: request.hospital_name.clone(),
                reason,
            };
            self.dispatcher
                .notify_event(
                    &[hospital_recipient(&request)],
                    &event,
                    &json!({ "request_id": request.request_id }),
                )
                .await;
        }
        Ok(request)
    }

    /// 完成申请（APPROVED → FULFILLED）
    pub fn fulfill_request(&self, request_id: &str, actor: &str) -> ApiResult<BloodRequest> {
        let request = self.transition(
            request_id,
            RequestStatus::Fulfilled,
            ActionType::FulfillRequest,
            None,
            actor,
        )?;
        self.forecaster.refresh(request.blood_type);
        Ok(request)
    }

    /// 撤销申请（仅 PENDING 可撤销）
    pub fn cancel_request(
        &self,
        request_id: &str,
        reason: Option<&str>,
        actor: &str,
    ) -> ApiResult<BloodRequest> {
        let request = self.transition(
            request_id,
            RequestStatus::Cancelled,
            ActionType::CancelRequest,
            validator::normalize_optional(reason),
            actor,
        )?;
        self.forecaster.refresh(request.blood_type);
        Ok(request)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询申请
    pub fn get_request(&self, request_id: &str) -> ApiResult<BloodRequest> {
        self.load_request(request_id)
    }

    /// 申请列表（可按状态过滤,创建时间倒序）
    pub fn list_requests(&self, status: Option<&str>) -> ApiResult<Vec<BloodRequest>> {
        let status = status.map(validator::parse_request_status).transpose()?;
        Ok(self.repos.request_repo.list(status)?)
    }

    // ==========================================
    // 内部方法
    // ==========================================

    fn load_request(&self, request_id: &str) -> ApiResult<BloodRequest> {
        Ok(self
            .repos
            .request_repo
            .find_by_id(request_id)?
            .ok_or_else(|| RepositoryError::not_found("BloodRequest", request_id))?)
    }

    /// 不涉及库存的状态迁移
    #[instrument(skip(self, detail))]
    fn transition(
        &self,
        request_id: &str,
        target: RequestStatus,
        action: ActionType,
        detail: Option<String>,
        actor: &str,
    ) -> ApiResult<BloodRequest> {
        let now = self.clock.now();

        let updated = self
            .repos
            .uow
            .run(|tx| -> ApiResult<BloodRequest> {
                let current = load_request_in(tx, request_id)?;
                check_transition(&current, target)?;

                let revision = BloodRequestRepository::update_status_in(
                    tx,
                    request_id,
                    current.revision,
                    target,
                    now,
                )?;

                let mut log = ActionLog::new(action, actor, now)
                    .with_entity(request_id)
                    .with_blood_type(current.blood_type.as_str())
                    .with_payload(json!({ "from": current.status, "to": target }));
                if let Some(d) = &detail {
                    log = log.with_detail(d.clone());
                }
                ActionLogRepository::insert_in(tx, &log)?;

                Ok(BloodRequest {
                    status: target,
                    revision,
                    updated_at: now,
                    ..current
                })
            })
            .map_err(|e| e.on_write(action.as_str()))?;

        tracing::info!(status = %updated.status, "申请状态已更新");
        Ok(updated)
    }
}

fn load_request_in(conn: &Connection, request_id: &str) -> ApiResult<BloodRequest> {
    Ok(BloodRequestRepository::find_by_id_in(conn, request_id)?
        .ok_or_else(|| RepositoryError::not_found("BloodRequest", request_id))?)
}

fn check_transition(request: &BloodRequest, target: RequestStatus) -> ApiResult<()> {
    if request.status.can_transition_to(target) {
        Ok(())
    } else {
        Err(ApiError::InvalidStateTransition {
            from: request.status.to_string(),
            to: target.to_string(),
        })
    }
}

fn hospital_recipient(request: &BloodRequest) -> Recipient {
    Recipient::new(request.hospital_name.clone(), request.contact_email.clone(), None)
}
