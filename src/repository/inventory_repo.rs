// ==========================================
// 血库管理核心 - 库存批次数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑 (扣减顺序/数量由引擎层决定)
// 并发: 批次更新以“读到的 units + status”为条件,0 行即乐观锁冲突
// ==========================================

use crate::domain::inventory::{BatchDeduction, InventoryBatch, StockLevel};
use crate::domain::types::{BatchStatus, BloodType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const BATCH_COLUMNS: &str = r#"
    batch_id, blood_type, units, donation_date, expiry_date, status,
    donor_id, center_id, created_at, updated_at
"#;

// ==========================================
// InventoryBatchRepository - 库存批次仓储
// ==========================================
pub struct InventoryBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryBatchRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入批次（需在事务内调用）
    pub fn insert_in(conn: &Connection, batch: &InventoryBatch) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO inventory_batch (
                batch_id, blood_type, units, donation_date, expiry_date, status,
                donor_id, center_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                batch.batch_id,
                batch.blood_type,
                batch.units,
                batch.donation_date,
                batch.expiry_date,
                batch.status,
                batch.donor_id,
                batch.center_id,
                batch.created_at,
                batch.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 插入批次
    pub fn insert(&self, batch: &InventoryBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_in(&conn, batch)
    }

    /// 应用单批次扣减（需在事务内调用）
    ///
    /// # 并发控制
    /// WHERE 条件包含扣减前的 units 与 AVAILABLE 状态;
    /// 若其他写入者已改动该批次,影响行数为 0,返回 OptimisticLockFailure
    pub fn apply_deduction_in(
        conn: &Connection,
        deduction: &BatchDeduction,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE inventory_batch
               SET units = ?1, status = ?2, updated_at = ?3
             WHERE batch_id = ?4 AND units = ?5 AND status = ?6
            "#,
            params![
                deduction.units_after,
                deduction.status_after,
                now,
                deduction.batch_id,
                deduction.units_before,
                BatchStatus::Available,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::OptimisticLockFailure {
                entity: "InventoryBatch".to_string(),
                id: deduction.batch_id.clone(),
                detail: format!("批次已被修改（期望 units={}，AVAILABLE）", deduction.units_before),
            });
        }
        Ok(())
    }

    /// 将失效日期早于 today 的可用批次标记为 EXPIRED（需在事务内调用）
    ///
    /// # 返回
    /// - 被标记的批次（标记前快照）
    pub fn mark_expired_in(
        conn: &Connection,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> RepositoryResult<Vec<InventoryBatch>> {
        let sql = format!(
            "SELECT {} FROM inventory_batch WHERE status = ?1 AND expiry_date < ?2 ORDER BY expiry_date",
            BATCH_COLUMNS
        );
        let stale = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![BatchStatus::Available, today], map_batch_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        for batch in &stale {
            conn.execute(
                "UPDATE inventory_batch SET status = ?1, updated_at = ?2 WHERE batch_id = ?3 AND status = ?4",
                params![BatchStatus::Expired, now, batch.batch_id, BatchStatus::Available],
            )?;
        }

        Ok(stale)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询可出库批次（事务内版本）
    ///
    /// # 说明
    /// - 状态 AVAILABLE 且 units > 0 且 expiry_date >= today
    /// - 按失效日期升序（先到期先出）,同日按入库时间
    pub fn find_available_in(
        conn: &Connection,
        blood_type: BloodType,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<InventoryBatch>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_batch
             WHERE blood_type = ?1 AND status = ?2 AND units > 0 AND expiry_date >= ?3
             ORDER BY expiry_date ASC, created_at ASC, batch_id ASC
            "#,
            BATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let batches = stmt
            .query_map(params![blood_type, BatchStatus::Available, today], map_batch_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(batches)
    }

    /// 查询可出库批次
    pub fn find_available(
        &self,
        blood_type: BloodType,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<InventoryBatch>> {
        let conn = self.get_conn()?;
        Self::find_available_in(&conn, blood_type, today)
    }

    /// 可出库单位合计
    pub fn sum_available(&self, blood_type: BloodType, today: NaiveDate) -> RepositoryResult<u32> {
        let conn = self.get_conn()?;
        let total: i64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(units), 0) FROM inventory_batch
             WHERE blood_type = ?1 AND status = ?2 AND expiry_date >= ?3
            "#,
            params![blood_type, BatchStatus::Available, today],
            |row| row.get(0),
        )?;
        u32::try_from(total)
            .map_err(|_| RepositoryError::InternalError(format!("库存合计越界: {}", total)))
    }

    /// 按 batch_id 查询
    pub fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<InventoryBatch>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM inventory_batch WHERE batch_id = ?1", BATCH_COLUMNS);
        let batch = conn
            .query_row(&sql, params![batch_id], map_batch_row)
            .optional()?;
        Ok(batch)
    }

    /// 按血型查询全部批次（含已用/过期,审计用）
    pub fn find_by_blood_type(
        &self,
        blood_type: BloodType,
    ) -> RepositoryResult<Vec<InventoryBatch>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM inventory_batch WHERE blood_type = ?1 ORDER BY expiry_date ASC, created_at ASC",
            BATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let batches = stmt
            .query_map(params![blood_type], map_batch_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(batches)
    }

    /// 按血型汇总可出库库存
    ///
    /// # 返回
    /// - 仅包含有可用批次的血型; 缺失血型由调用方补零
    pub fn summarize_available(&self, today: NaiveDate) -> RepositoryResult<Vec<StockLevel>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT blood_type, COALESCE(SUM(units), 0), COUNT(*), MIN(expiry_date)
              FROM inventory_batch
             WHERE status = ?1 AND units > 0 AND expiry_date >= ?2
             GROUP BY blood_type
            "#,
        )?;

        let levels = stmt
            .query_map(params![BatchStatus::Available, today], |row| {
                Ok(StockLevel {
                    blood_type: row.get(0)?,
                    available_units: row.get(1)?,
                    batch_count: row.get(2)?,
                    earliest_expiry: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(levels)
    }
}

fn map_batch_row(row: &Row<'_>) -> rusqlite::Result<InventoryBatch> {
    Ok(InventoryBatch {
        batch_id: row.get(0)?,
        blood_type: row.get(1)?,
        units: row.get(2)?,
        donation_date: row.get(3)?,
        expiry_date: row.get(4)?,
        status: row.get(5)?,
        donor_id: row.get(6)?,
        center_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
