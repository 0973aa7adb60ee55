// ==========================================
// 血库管理核心 - 需求预测数据仓储
// ==========================================
// 说明: 每个血型一行,INSERT OR REPLACE (后写覆盖)
// ==========================================

use crate::domain::forecast::DemandForecast;
use crate::domain::types::BloodType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const FORECAST_COLUMNS: &str = r#"
    blood_type, current_stock, short_term_demand, medium_term_demand,
    urgency_level, urgency_reason, computed_at
"#;

// ==========================================
// DemandForecastRepository - 需求预测仓储
// ==========================================
pub struct DemandForecastRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DemandForecastRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入预测（upsert）
    pub fn upsert(&self, forecast: &DemandForecast) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO demand_forecast (
                blood_type, current_stock, short_term_demand, medium_term_demand,
                urgency_level, urgency_reason, computed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                forecast.blood_type,
                forecast.current_stock,
                forecast.short_term_demand,
                forecast.medium_term_demand,
                forecast.urgency_level,
                forecast.urgency_reason,
                forecast.computed_at,
            ],
        )?;
        Ok(())
    }

    /// 按血型查询
    pub fn find_by_blood_type(
        &self,
        blood_type: BloodType,
    ) -> RepositoryResult<Option<DemandForecast>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM demand_forecast WHERE blood_type = ?1",
            FORECAST_COLUMNS
        );
        let forecast = conn
            .query_row(&sql, params![blood_type], map_forecast_row)
            .optional()?;
        Ok(forecast)
    }

    /// 查询全部预测
    pub fn list_all(&self) -> RepositoryResult<Vec<DemandForecast>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM demand_forecast ORDER BY blood_type",
            FORECAST_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let forecasts = stmt
            .query_map([], map_forecast_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(forecasts)
    }
}

fn map_forecast_row(row: &Row<'_>) -> rusqlite::Result<DemandForecast> {
    Ok(DemandForecast {
        blood_type: row.get(0)?,
        current_stock: row.get(1)?,
        short_term_demand: row.get(2)?,
        medium_term_demand: row.get(3)?,
        urgency_level: row.get(4)?,
        urgency_reason: row.get(5)?,
        computed_at: row.get(6)?,
    })
}
