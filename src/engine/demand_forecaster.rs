// ==========================================
// 血库管理核心 - 需求预测引擎
// ==========================================
// 职责: 按血型计算短期/中期需求与紧急等级
// 规则:
// - 短期需求 = 待审批 + 已批准申请的单位合计
// - 中期需求 = 短期需求 × 外推系数 (默认 1.5, 线性占位启发式)
// - HIGH: 短期需求 > 当前库存
// - MEDIUM: 短期需求 > 当前库存 × 比例 (默认 0.5)
// - LOW: 其余
// 红线: 预测是参考信号; 并发重算按"最后写入者为准"
// 触发: 献血入库、申请状态变更后由调用方显式调用
// ==========================================

use crate::config::{BloodBankSettings, ConfigManager};
use crate::domain::forecast::DemandForecast;
use crate::domain::types::{BloodType, RequestStatus, UrgencyLevel};
use crate::engine::clock::Clock;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::repositories::BloodBankRepositories;
use chrono::NaiveDateTime;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

/// 计入短期需求的申请状态
pub const DEMAND_STATUSES: [RequestStatus; 2] = [RequestStatus::Pending, RequestStatus::Approved];

/// 判定紧急等级
pub fn evaluate_urgency(
    short_term_demand: u32,
    current_stock: u32,
    medium_ratio: f64,
) -> UrgencyLevel {
    if short_term_demand > current_stock {
        UrgencyLevel::High
    } else if f64::from(short_term_demand) > f64::from(current_stock) * medium_ratio {
        UrgencyLevel::Medium
    } else {
        UrgencyLevel::Low
    }
}

/// 由库存与需求构造预测（纯函数）
pub fn build_forecast(
    blood_type: BloodType,
    current_stock: u32,
    short_term_demand: u32,
    settings: &BloodBankSettings,
    computed_at: NaiveDateTime,
) -> DemandForecast {
    let urgency_level =
        evaluate_urgency(short_term_demand, current_stock, settings.medium_urgency_ratio);
    let medium_term_demand = f64::from(short_term_demand) * settings.medium_term_factor;

    let rule = match urgency_level {
        UrgencyLevel::High => "DEMAND_EXCEEDS_STOCK",
        UrgencyLevel::Medium => "DEMAND_ABOVE_RATIO",
        UrgencyLevel::Low => "STOCK_SUFFICIENT",
    };
    let reason = json!({
        "rule": rule,
        "current_stock": current_stock,
        "short_term_demand": short_term_demand,
        "medium_threshold": f64::from(current_stock) * settings.medium_urgency_ratio,
        "medium_term_factor": settings.medium_term_factor,
    });

    DemandForecast {
        blood_type,
        current_stock,
        short_term_demand,
        medium_term_demand,
        urgency_level,
        urgency_reason: reason.to_string(),
        computed_at,
    }
}

// ==========================================
// DemandForecaster - 需求预测器
// ==========================================
pub struct DemandForecaster {
    repos: BloodBankRepositories,
    config: Arc<ConfigManager>,
    clock: Arc<dyn Clock>,
}

impl DemandForecaster {
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

    /// 重算单个血型并落库（upsert）
    #[instrument(skip(self, settings))]
    pub fn recompute(
        &self,
        blood_type: BloodType,
        settings: &BloodBankSettings,
    ) -> EngineResult<DemandForecast> {
        let current_stock = self
            .repos
            .inventory_repo
            .sum_available(blood_type, self.clock.today())?;
        let short_term_demand = self
            .repos
            .request_repo
            .sum_units_by_status(blood_type, &DEMAND_STATUSES)?;

        let forecast = build_forecast(
            blood_type,
            current_stock,
            short_term_demand,
            settings,
            self.clock.now(),
        );
        self.repos.forecast_repo.upsert(&forecast)?;

        tracing::debug!(
            stock = current_stock,
            demand = short_term_demand,
            urgency = %forecast.urgency_level,
            "需求预测已更新"
        );
        Ok(forecast)
    }

    /// 状态变更后的重算（尽力而为）
    ///
    /// 读取配置或重算失败只告警,返回 None; 调用方的写入结果不受影响
    pub fn refresh(&self, blood_type: BloodType) -> Option<DemandForecast> {
        let outcome = self
            .config
            .load_settings()
            .map_err(EngineError::from)
            .and_then(|settings| self.recompute(blood_type, &settings));

        match outcome {
            Ok(forecast) => Some(forecast),
            Err(e) => {
                tracing::warn!(blood_type = %blood_type, error = %e, "需求预测重算失败（已忽略）");
                None
            }
        }
    }

    /// 重算全部血型
    pub fn recompute_all(&self, settings: &BloodBankSettings) -> EngineResult<Vec<DemandForecast>> {
        BloodType::ALL
            .iter()
            .map(|bt| self.recompute(*bt, settings))
            .collect()
    }
}
