// ==========================================
// 血库管理核心 - 应用层
// ==========================================
// 职责: 组装仓储、引擎与 API,供可执行入口或宿主程序使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
