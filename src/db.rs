// ==========================================
// 血库管理核心 - SQLite 连接初始化与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 统一建表入口，测试与正式运行使用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 所有表均使用 IF NOT EXISTS，可在已有库上重复执行
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    match read_schema_version(conn)? {
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            tracing::warn!(
                db_version = v,
                code_version = CURRENT_SCHEMA_VERSION,
                "数据库 schema 版本高于当前代码期望版本"
            );
        }
        _ => {}
    }

    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS donor (
    donor_id TEXT PRIMARY KEY,
    blood_type TEXT NOT NULL,
    last_donation_date TEXT,
    eligible_to_donate INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_donor_blood_type ON donor(blood_type, eligible_to_donate);

CREATE TABLE IF NOT EXISTS donor_profile (
    donor_id TEXT PRIMARY KEY REFERENCES donor(donor_id) ON DELETE CASCADE,
    full_name TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    city TEXT,
    latitude REAL,
    longitude REAL
);

CREATE TABLE IF NOT EXISTS inventory_batch (
    batch_id TEXT PRIMARY KEY,
    blood_type TEXT NOT NULL,
    units INTEGER NOT NULL CHECK (units >= 0),
    donation_date TEXT NOT NULL,
    expiry_date TEXT NOT NULL,
    status TEXT NOT NULL,
    donor_id TEXT,
    center_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_inventory_batch_type_status_expiry
    ON inventory_batch(blood_type, status, expiry_date);

CREATE TABLE IF NOT EXISTS blood_request (
    request_id TEXT PRIMARY KEY,
    hospital_name TEXT NOT NULL,
    contact_email TEXT,
    blood_type TEXT NOT NULL,
    units_requested INTEGER NOT NULL CHECK (units_requested > 0),
    priority TEXT NOT NULL,
    status TEXT NOT NULL,
    notes TEXT,
    revision INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_blood_request_type_status ON blood_request(blood_type, status);

CREATE TABLE IF NOT EXISTS demand_forecast (
    blood_type TEXT PRIMARY KEY,
    current_stock INTEGER NOT NULL,
    short_term_demand INTEGER NOT NULL,
    medium_term_demand REAL NOT NULL,
    urgency_level TEXT NOT NULL,
    urgency_reason TEXT NOT NULL,
    computed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    entity_id TEXT,
    blood_type TEXT,
    payload_json TEXT,
    detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_action_log_entity ON action_log(entity_id, action_ts);
"#;
