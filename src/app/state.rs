// ==========================================
// 血库管理核心 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 全部仓储共享一个 SQLite 连接; 时钟与通知服务可注入
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{DashboardApi, DonorApi, InventoryApi, MatchingApi, RequestApi};
use crate::config::{ConfigManager, GeolocationMode};
use crate::db;
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::demand_forecaster::DemandForecaster;
use crate::engine::donor_matcher::DonorMatcher;
use crate::engine::geolocation::provider_for;
use crate::engine::inventory_ledger::InventoryLedger;
use crate::engine::locks::BloodTypeLocks;
use crate::engine::notification::{
    LoggingNotificationService, NotificationDispatcher, NotificationService,
};
use crate::engine::repositories::BloodBankRepositories;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "BLOOD_BANK_DB_PATH";

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 献血者API
    pub donor_api: Arc<DonorApi>,

    /// 用血申请API
    pub request_api: Arc<RequestApi>,

    /// 库存API
    pub inventory_api: Arc<InventoryApi>,

    /// 匹配API
    pub matching_api: Arc<MatchingApi>,

    /// 看板API
    pub dashboard_api: Arc<DashboardApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 仓储集合（审计/运维查询）
    pub repos: BloodBankRepositories,
}

impl AppState {
    /// 创建新的AppState实例（系统时钟 + 日志通知服务）
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并初始化 schema
    /// 2. 初始化所有Repository与Engine
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;

        Self::from_connection(
            db_path,
            conn,
            Arc::new(SystemClock),
            Arc::new(LoggingNotificationService),
        )
    }

    /// 基于已打开的连接组装（测试注入固定时钟/通知服务）
    pub fn from_connection(
        db_path: String,
        conn: Connection,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationService>,
    ) -> Result<Self, String> {
        db::init_schema(&conn).map_err(|e| format!("无法初始化数据库schema: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let repos = BloodBankRepositories::from_connection(conn.clone());
        let config_manager = Arc::new(ConfigManager::new(conn));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let locks = Arc::new(BloodTypeLocks::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(notifier));

        let geolocation_mode = config_manager.get_geolocation_mode().unwrap_or_else(|e| {
            tracing::warn!("读取定位模式失败，使用 PROFILE: {}", e);
            GeolocationMode::Profile
        });
        let matcher = Arc::new(DonorMatcher::new(
            repos.donor_repo.clone(),
            provider_for(geolocation_mode),
            clock.clone(),
        ));

        let ledger = Arc::new(InventoryLedger::new(
            repos.clone(),
            locks.clone(),
            clock.clone(),
        ));
        let forecaster = Arc::new(DemandForecaster::new(
            repos.clone(),
            config_manager.clone(),
            clock.clone(),
        ));

        // ==========================================
        // 创建API实例
        // ==========================================
        let donor_api = Arc::new(DonorApi::new(
            repos.clone(),
            config_manager.clone(),
            clock.clone(),
        ));
        let request_api = Arc::new(RequestApi::new(
            repos.clone(),
            forecaster.clone(),
            dispatcher.clone(),
            locks,
            clock.clone(),
        ));
        let inventory_api = Arc::new(InventoryApi::new(
            repos.clone(),
            config_manager.clone(),
            ledger,
            forecaster.clone(),
            clock.clone(),
        ));
        let matching_api = Arc::new(MatchingApi::new(
            repos.clone(),
            config_manager.clone(),
            matcher,
            dispatcher.clone(),
            clock.clone(),
        ));
        let dashboard_api = Arc::new(DashboardApi::new(
            repos.clone(),
            config_manager.clone(),
            forecaster,
            dispatcher,
            clock,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            donor_api,
            request_api,
            inventory_api,
            matching_api,
            dashboard_api,
            config_manager,
            repos,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 BLOOD_BANK_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./blood_bank.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("blood-bank-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("blood-bank");
        }

        // 确保目录存在; 失败时 open 会给出明确错误
        std::fs::create_dir_all(&path).ok();
        path = path.join("blood_bank.db");
    }

    path.to_string_lossy().to_string()
}
