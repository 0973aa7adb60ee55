// ==========================================
// 血库管理核心 - 用血申请数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑 (状态机校验在 API 层)
// 并发: 状态更新带 revision 检查 (乐观锁)
// ==========================================

use crate::domain::request::BloodRequest;
use crate::domain::types::{BloodType, RequestStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const REQUEST_COLUMNS: &str = r#"
    request_id, hospital_name, contact_email, blood_type, units_requested,
    priority, status, notes, revision, created_at, updated_at
"#;

// ==========================================
// BloodRequestRepository - 用血申请仓储
// ==========================================
pub struct BloodRequestRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BloodRequestRepository {
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

    /// 插入申请（需在事务内调用）
    pub fn insert_in(conn: &Connection, request: &BloodRequest) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO blood_request (
                request_id, hospital_name, contact_email, blood_type, units_requested,
                priority, status, notes, revision, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                request.request_id,
                request.hospital_name,
                request.contact_email,
                request.blood_type,
                request.units_requested,
                request.priority,
                request.status,
                request.notes,
                request.revision,
                request.created_at,
                request.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 更新申请状态（需在事务内调用,带乐观锁检查）
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision 不匹配 (其他操作已更新)
    /// - `RepositoryError::NotFound`: request_id 不存在
    ///
    /// # 返回
    /// - 更新后的 revision
    pub fn update_status_in(
        conn: &Connection,
        request_id: &str,
        expected_revision: i32,
        status: RequestStatus,
        now: NaiveDateTime,
    ) -> RepositoryResult<i32> {
        let rows = conn.execute(
            r#"
            UPDATE blood_request
               SET status = ?1, updated_at = ?2, revision = revision + 1
             WHERE request_id = ?3 AND revision = ?4
            "#,
            params![status, now, request_id, expected_revision],
        )?;

        if rows == 0 {
            // 判断是记录不存在还是 revision 冲突
            let actual: Option<i32> = conn
                .query_row(
                    "SELECT revision FROM blood_request WHERE request_id = ?1",
                    params![request_id],
                    |row| row.get(0),
                )
                .optional()?;

            return match actual {
                Some(actual_revision) => Err(RepositoryError::OptimisticLockFailure {
                    entity: "BloodRequest".to_string(),
                    id: request_id.to_string(),
                    detail: format!(
                        "期望revision={}，实际revision={}",
                        expected_revision, actual_revision
                    ),
                }),
                None => Err(RepositoryError::not_found("BloodRequest", request_id)),
            };
        }

        Ok(expected_revision + 1)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 request_id 查询（事务内版本）
    pub fn find_by_id_in(
        conn: &Connection,
        request_id: &str,
    ) -> RepositoryResult<Option<BloodRequest>> {
        let sql = format!("SELECT {} FROM blood_request WHERE request_id = ?1", REQUEST_COLUMNS);
        let request = conn
            .query_row(&sql, params![request_id], map_request_row)
            .optional()?;
        Ok(request)
    }

    /// 按 request_id 查询
    pub fn find_by_id(&self, request_id: &str) -> RepositoryResult<Option<BloodRequest>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, request_id)
    }

    /// 查询申请列表
    ///
    /// # 参数
    /// - status: 可选状态过滤; None 返回全部
    ///
    /// # 排序
    /// - 创建时间倒序
    pub fn list(&self, status: Option<RequestStatus>) -> RepositoryResult<Vec<BloodRequest>> {
        let conn = self.get_conn()?;
        let requests = match status {
            Some(s) => {
                let sql = format!(
                    "SELECT {} FROM blood_request WHERE status = ?1 ORDER BY created_at DESC, request_id",
                    REQUEST_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![s], map_request_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM blood_request ORDER BY created_at DESC, request_id",
                    REQUEST_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], map_request_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(requests)
    }

    /// 统计指定血型、指定状态集合内的申请单位合计
    pub fn sum_units_by_status(
        &self,
        blood_type: BloodType,
        statuses: &[RequestStatus],
    ) -> RepositoryResult<u32> {
        if statuses.is_empty() {
            return Ok(0);
        }

        let placeholders = (0..statuses.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT COALESCE(SUM(units_requested), 0) FROM blood_request WHERE blood_type = ?1 AND status IN ({})",
            placeholders
        );

        let mut values: Vec<String> = Vec::with_capacity(statuses.len() + 1);
        values.push(blood_type.as_str().to_string());
        values.extend(statuses.iter().map(|s| s.to_db_str().to_string()));

        let conn = self.get_conn()?;
        let total: i64 = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        u32::try_from(total)
            .map_err(|_| RepositoryError::InternalError(format!("申请单位合计越界: {}", total)))
    }
}

fn map_request_row(row: &Row<'_>) -> rusqlite::Result<BloodRequest> {
    Ok(BloodRequest {
        request_id: row.get(0)?,
        hospital_name: row.get(1)?,
        contact_email: row.get(2)?,
        blood_type: row.get(3)?,
        units_requested: row.get(4)?,
        priority: row.get(5)?,
        status: row.get(6)?,
        notes: row.get(7)?,
        revision: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::RequestPriority;
    use chrono::NaiveDate;

    fn setup() -> (Arc<Mutex<Connection>>, BloodRequestRepository) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (conn.clone(), BloodRequestRepository::new(conn))
    }

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn request(
        id: &str,
        bt: BloodType,
        units: u32,
        status: RequestStatus,
        hour: u32,
    ) -> BloodRequest {
        BloodRequest {
            request_id: id.to_string(),
            hospital_name: "General Hospital".to_string(),
            contact_email: None,
            blood_type: bt,
            units_requested: units,
            priority: RequestPriority::High,
            status,
            notes: None,
            revision: 0,
            created_at: ts(hour),
            updated_at: ts(hour),
        }
    }

    #[test]
    fn test_update_status_with_revision() {
        let (conn, repo) = setup();
        let c = conn.lock().unwrap();
        let pending = request("R1", BloodType::APos, 2, RequestStatus::Pending, 8);
        BloodRequestRepository::insert_in(&c, &pending).unwrap();

        let rev =
            BloodRequestRepository::update_status_in(&c, "R1", 0, RequestStatus::Approved, ts(9))
                .unwrap();
        assert_eq!(rev, 1);

        // 旧 revision 再次更新 → 乐观锁冲突
        let stale =
            BloodRequestRepository::update_status_in(&c, "R1", 0, RequestStatus::Rejected, ts(9));
        assert!(matches!(stale, Err(RepositoryError::OptimisticLockFailure { .. })));

        let missing =
            BloodRequestRepository::update_status_in(&c, "nope", 0, RequestStatus::Rejected, ts(9));
        assert!(matches!(missing, Err(RepositoryError::NotFound { .. })));
        drop(c);

        let r = repo.find_by_id("R1").unwrap().unwrap();
        assert_eq!(r.status, RequestStatus::Approved);
        assert_eq!(r.revision, 1);
    }

    #[test]
    fn test_sum_units_and_list() {
        let (conn, repo) = setup();
        {
            let c = conn.lock().unwrap();
            for r in [
                request("R1", BloodType::ONeg, 2, RequestStatus::Pending, 8),
                request("R2", BloodType::ONeg, 3, RequestStatus::Approved, 9),
                request("R3", BloodType::ONeg, 7, RequestStatus::Rejected, 10),
                request("R4", BloodType::OPos, 4, RequestStatus::Pending, 11),
            ] {
                BloodRequestRepository::insert_in(&c, &r).unwrap();
            }
        }

        let demand = repo
            .sum_units_by_status(
                BloodType::ONeg,
                &[RequestStatus::Pending, RequestStatus::Approved],
            )
            .unwrap();
        assert_eq!(demand, 5);
        assert_eq!(repo.sum_units_by_status(BloodType::ONeg, &[]).unwrap(), 0);

        let pending = repo.list(Some(RequestStatus::Pending)).unwrap();
        let ids: Vec<_> = pending.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, vec!["R4", "R1"]);
        assert_eq!(repo.list(None).unwrap().len(), 4);
    }
}
