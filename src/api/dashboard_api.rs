// ==========================================
// 血库管理核心 - 看板 API
// ==========================================
// 职责: 库存 + 需求预测聚合视图、预测重算、库存告急通知、操作日志查询
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::ApiResult;
use crate::api::validator;
use crate::config::ConfigManager;
use crate::domain::action_log::ActionLog;
use crate::domain::forecast::DemandForecast;
use crate::domain::types::{BloodType, UrgencyLevel};
use crate::engine::demand_forecaster::DemandForecaster;
use crate::engine::notification::{
    DispatchReport, NotificationDispatcher, NotificationEvent, Recipient,
};
use crate::engine::repositories::BloodBankRepositories;
use crate::engine::clock::Clock;

/// 单血型看板行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloodTypeOverview {
    pub blood_type: BloodType,
    pub available_units: u32,
    pub batch_count: u32,
    pub earliest_expiry: Option<chrono::NaiveDate>,
    /// 尚未计算过预测时为 None
    pub forecast: Option<DemandForecast>,
}

// ==========================================
// DashboardApi - 看板 API
// ==========================================
pub struct DashboardApi {
    repos: BloodBankRepositories,
    config: Arc<ConfigManager>,
    forecaster: Arc<DemandForecaster>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl DashboardApi {
    pub fn new(
        repos: BloodBankRepositories,
        config: Arc<ConfigManager>,
        forecaster: Arc<DemandForecaster>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            config,
            forecaster,
            dispatcher,
            clock,
        }
    }

    /// 全血型概览（库存 + 最近一次预测）
    pub fn overview(&self) -> ApiResult<Vec<BloodTypeOverview>> {
        let levels = self
            .repos
            .inventory_repo
            .summarize_available(self.clock.today())?;
        let forecasts = self.repos.forecast_repo.list_all()?;

        Ok(BloodType::ALL
            .iter()
            .map(|bt| {
                let level = levels.iter().find(|l| l.blood_type == *bt);
                BloodTypeOverview {
                    blood_type: *bt,
                    available_units: level.map_or(0, |l| l.available_units),
                    batch_count: level.map_or(0, |l| l.batch_count),
                    earliest_expiry: level.and_then(|l| l.earliest_expiry),
                    forecast: forecasts.iter().find(|f| f.blood_type == *bt).cloned(),
                }
            })
            .collect())
    }

    /// 重算单个血型预测
    pub fn recompute(&self, blood_type: &str) -> ApiResult<DemandForecast> {
        let blood_type = validator::parse_blood_type(blood_type)?;
        let settings = self.config.load_settings()?;
        Ok(self.forecaster.recompute(blood_type, &settings)?)
    }

    /// 重算全部血型预测
    pub fn recompute_all(&self) -> ApiResult<Vec<DemandForecast>> {
        let settings = self.config.load_settings()?;
        Ok(self.forecaster.recompute_all(&settings)?)
    }

    /// 查询已存储的预测
    pub fn get_forecast(&self, blood_type: &str) -> ApiResult<Option<DemandForecast>> {
        let blood_type = validator::parse_blood_type(blood_type)?;
        Ok(self.repos.forecast_repo.find_by_blood_type(blood_type)?)
    }

    /// 对紧急等级为 HIGH 的血型发送告急通知
    ///
    /// # 参数
    /// - staff: 接收告急的工作人员
    ///
    /// # 返回
    /// - 每个告急血型一条分发结果; 通知失败不影响返回
    pub async fn alert_low_stock(&self, staff: &[Recipient]) -> ApiResult<Vec<DispatchReport>> {
        let high: Vec<DemandForecast> = self
            .repos
            .forecast_repo
            .list_all()?
            .into_iter()
            .filter(|f| f.urgency_level == UrgencyLevel::High)
            .collect();

        let mut reports = Vec::with_capacity(high.len());
        for forecast in &high {
            let event = NotificationEvent::LowStockAlert {
                blood_type: forecast.blood_type,
                current_stock: forecast.current_stock,
                short_term_demand: forecast.short_term_demand,
            };
            let metadata = json!({
                "blood_type": forecast.blood_type,
                "computed_at": forecast.computed_at,
            });
            reports.push(self.dispatcher.notify_event(staff, &event, &metadata).await);
        }
        Ok(reports)
    }

    /// 最近操作日志
    pub fn list_recent_actions(&self, limit: u32) -> ApiResult<Vec<ActionLog>> {
        Ok(self.repos.action_log_repo.list_recent(limit.clamp(1, 500))?)
    }

    /// 某实体（申请/献血者/批次）的操作日志
    pub fn list_actions_for_entity(&self, entity_id: &str) -> ApiResult<Vec<ActionLog>> {
        Ok(self.repos.action_log_repo.find_by_entity(entity_id)?)
    }
}
