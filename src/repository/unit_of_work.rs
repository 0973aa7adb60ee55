// ==========================================
// 血库管理核心 - 事务单元
// ==========================================
// 职责: 多表写入在同一个 IMMEDIATE 事务内完成
// 约束: 闭包返回 Err 时整体回滚,不留下部分台账状态
// ==========================================

use crate::repository::error::RepositoryError;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};

pub struct UnitOfWork {
    conn: Arc<Mutex<Connection>>,
}

impl UnitOfWork {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 在事务内执行闭包
    ///
    /// # 说明
    /// - IMMEDIATE: 开始即获取写锁,避免多进程下读后写升级失败
    /// - 闭包内只能使用传入的事务,不可再调用持锁的仓储方法（会死锁）
    /// - 错误类型由调用方决定（引擎层可携带库存不足等业务错误触发回滚）
    pub fn run<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| E::from(RepositoryError::LockError(e.to_string())))?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| E::from(RepositoryError::DatabaseTransactionError(e.to_string())))?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(|e| {
                    E::from(RepositoryError::DatabaseTransactionError(e.to_string()))
                })?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!("事务回滚失败: {}", rollback_err);
                }
                Err(err)
            }
        }
    }
}
