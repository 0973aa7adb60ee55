// ==========================================
// 血库管理核心 - 操作日志数据仓储
// ==========================================
// 红线: 所有写入必须记录
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
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

    /// 插入操作日志（需在事务内调用）
    pub fn insert_in(conn: &Connection, log: &ActionLog) -> RepositoryResult<String> {
        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, action_type, action_ts, actor,
                entity_id, blood_type, payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                log.action_id,
                log.action_type,
                log.action_ts,
                log.actor,
                log.entity_id,
                log.blood_type,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    /// 插入操作日志
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_in(&conn, log)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按关联实体查询（时间正序）
    pub fn find_by_entity(&self, entity_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, action_type, action_ts, actor, entity_id, blood_type, payload_json, detail
              FROM action_log
             WHERE entity_id = ?1
             ORDER BY action_ts ASC, rowid ASC
            "#,
        )?;
        let logs = stmt
            .query_map(params![entity_id], map_log_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    /// 最近的操作日志
    pub fn list_recent(&self, limit: u32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, action_type, action_ts, actor, entity_id, blood_type, payload_json, detail
              FROM action_log
             ORDER BY action_ts DESC, rowid DESC
             LIMIT ?1
            "#,
        )?;
        let logs = stmt
            .query_map(params![limit], map_log_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }
}

fn map_log_row(row: &Row<'_>) -> rusqlite::Result<ActionLog> {
    let payload: Option<String> = row.get(6)?;
    Ok(ActionLog {
        action_id: row.get(0)?,
        action_type: row.get(1)?,
        action_ts: row.get(2)?,
        actor: row.get(3)?,
        entity_id: row.get(4)?,
        blood_type: row.get(5)?,
        // 无法解析的 payload 视为缺失,不阻断审计查询
        payload_json: payload.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(7)?,
    })
}
