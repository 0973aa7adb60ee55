// ==========================================
// 血库管理核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// 约束: 非法配置值回退默认值并告警,不阻断业务
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// GeolocationMode - 定位模式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeolocationMode {
    Profile, // 使用档案登记坐标（默认）
    Demo,    // 演示模式: 随机坐标,仅限演示/测试环境
}

// ==========================================
// BloodBankSettings - 配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodBankSettings {
    pub donation_interval_days: i64,
    pub shelf_life_days: i64,
    pub units_per_donation: u32,
    pub candidate_buffer_factor: u32,
    pub medium_term_factor: f64,
    pub medium_urgency_ratio: f64,
    pub geolocation_mode: GeolocationMode,
}

impl Default for BloodBankSettings {
    fn default() -> Self {
        Self {
            donation_interval_days: 56,
            shelf_life_days: 42,
            units_per_donation: 1,
            candidate_buffer_factor: 2,
            medium_term_factor: 1.5,
            medium_urgency_ratio: 0.5,
            geolocation_mode: GeolocationMode::Profile,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取全部 global 配置
    pub fn get_all(&self) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().collect())
    }

    /// 读取并解析配置值,缺失或非法时回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + Copy,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    // ===== 献血与库存 =====

    /// 读取天数配置,取值须在 1..=max 内,否则回退默认值
    fn get_days_in_range(&self, key: &str, default: i64, max: i64) -> RepositoryResult<i64> {
        let v = self.get_parsed_or_default(key, default)?;
        if (1..=max).contains(&v) {
            Ok(v)
        } else {
            tracing::warn!(config_key = key, value = v, max, "配置天数越界，使用默认值");
            Ok(default)
        }
    }

    /// 献血最小间隔天数（默认 56,上限 365）
    pub fn get_donation_interval_days(&self) -> RepositoryResult<i64> {
        self.get_days_in_range(
            config_keys::DONATION_INTERVAL_DAYS,
            56,
            config_keys::MAX_DONATION_INTERVAL_DAYS,
        )
    }

    /// 保存期天数（默认 42,上限 365）
    pub fn get_shelf_life_days(&self) -> RepositoryResult<i64> {
        self.get_days_in_range(
            config_keys::SHELF_LIFE_DAYS,
            42,
            config_keys::MAX_SHELF_LIFE_DAYS,
        )
    }

    /// 每次献血入库单位数（默认 1）
    pub fn get_units_per_donation(&self) -> RepositoryResult<u32> {
        let v = self.get_parsed_or_default(config_keys::UNITS_PER_DONATION, 1u32)?;
        Ok(v.max(1))
    }

    // ===== 匹配 =====

    /// 候选缓冲系数（默认 2 → 返回 2 × 需求单位数个候选）
    pub fn get_candidate_buffer_factor(&self) -> RepositoryResult<u32> {
        let v = self.get_parsed_or_default(config_keys::CANDIDATE_BUFFER_FACTOR, 2u32)?;
        Ok(v.max(1))
    }

    /// 定位模式
    pub fn get_geolocation_mode(&self) -> RepositoryResult<GeolocationMode> {
        let value = self.get_config_value(config_keys::GEOLOCATION_MODE)?;
        Ok(match value.as_deref().map(|v| v.trim().to_uppercase()) {
            Some(ref v) if v == "DEMO" => GeolocationMode::Demo,
            Some(ref v) if v == "PROFILE" => GeolocationMode::Profile,
            None => GeolocationMode::Profile,
            Some(other) => {
                tracing::warn!(raw_value = %other, "未知定位模式，使用 PROFILE");
                GeolocationMode::Profile
            }
        })
    }

    // ===== 需求预测 =====

    /// 中期需求外推系数（默认 1.5）
    pub fn get_medium_term_factor(&self) -> RepositoryResult<f64> {
        let v = self.get_parsed_or_default(config_keys::MEDIUM_TERM_FACTOR, 1.5f64)?;
        Ok(if v.is_finite() && v > 0.0 { v } else { 1.5 })
    }

    /// 中等紧急阈值（占库存比例,默认 0.5）
    pub fn get_medium_urgency_ratio(&self) -> RepositoryResult<f64> {
        let v = self.get_parsed_or_default(config_keys::MEDIUM_URGENCY_RATIO, 0.5f64)?;
        Ok(if v.is_finite() && v > 0.0 && v <= 1.0 { v } else { 0.5 })
    }

    /// 读取完整配置快照
    pub fn load_settings(&self) -> RepositoryResult<BloodBankSettings> {
        Ok(BloodBankSettings {
            donation_interval_days: self.get_donation_interval_days()?,
            shelf_life_days: self.get_shelf_life_days()?,
            units_per_donation: self.get_units_per_donation()?,
            candidate_buffer_factor: self.get_candidate_buffer_factor()?,
            medium_term_factor: self.get_medium_term_factor()?,
            medium_urgency_ratio: self.get_medium_urgency_ratio()?,
            geolocation_mode: self.get_geolocation_mode()?,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 献血与库存
    pub const DONATION_INTERVAL_DAYS: &str = "donation_interval_days";
    pub const SHELF_LIFE_DAYS: &str = "shelf_life_days";
    pub const UNITS_PER_DONATION: &str = "units_per_donation";

    // 天数上限
    pub const MAX_DONATION_INTERVAL_DAYS: i64 = 365;
    pub const MAX_SHELF_LIFE_DAYS: i64 = 365;

    // 匹配
    pub const CANDIDATE_BUFFER_FACTOR: &str = "candidate_buffer_factor";
    pub const GEOLOCATION_MODE: &str = "geolocation_mode";

    // 需求预测
    pub const MEDIUM_TERM_FACTOR: &str = "medium_term_factor";
    pub const MEDIUM_URGENCY_RATIO: &str = "medium_urgency_ratio";
}
