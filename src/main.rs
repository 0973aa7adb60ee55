// ==========================================
// 血库管理核心 - 运维入口
// ==========================================
// 职责: 无界面例行维护: 过期批次清理 → 全血型预测重算 → 输出库存概览
// 退出码: 0 成功; 1 初始化或维护失败
// ==========================================

use blood_bank_core::app::{get_default_db_path, AppState};
use blood_bank_core::logging;

/// 维护任务操作人
const SYSTEM_ACTOR: &str = "system";

#[tokio::main]
async fn main() {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", blood_bank_core::APP_NAME);
    tracing::info!("系统版本: {}", blood_bank_core::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("无法初始化AppState: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_maintenance(&state).await {
        tracing::error!("例行维护失败: {:#}", e);
        std::process::exit(1);
    }

    tracing::info!("例行维护完成");
}

async fn run_maintenance(state: &AppState) -> anyhow::Result<()> {
    let sweep = state.inventory_api.expire_stale_batches(SYSTEM_ACTOR)?;
    tracing::info!(
        expired = sweep.expired.len(),
        expired_units = sweep.expired_units,
        "过期批次清理完成"
    );

    let forecasts = state.dashboard_api.recompute_all()?;
    tracing::info!(count = forecasts.len(), "需求预测已重算");

    for row in state.dashboard_api.overview()? {
        tracing::info!(
            blood_type = %row.blood_type,
            available_units = row.available_units,
            batch_count = row.batch_count,
            earliest_expiry = ?row.earliest_expiry,
            urgency = ?row.forecast.as_ref().map(|f| f.urgency_level),
            "库存概览"
        );
    }

    // 未配置值班人员时不发送预警
    let reports = state.dashboard_api.alert_low_stock(&[]).await?;
    if !reports.is_empty() {
        tracing::warn!(alerts = reports.len(), "存在高紧急度血型");
    }

    Ok(())
}
