// ==========================================
// 血库管理核心 - 血型级互斥锁
// ==========================================
// 职责: 同一血型的出库扣减串行执行,不同血型互不阻塞
// 说明: 进程内锁; 跨进程写入由 IMMEDIATE 事务 + 批次条件更新兜底
// ==========================================

use crate::domain::types::BloodType;
use crate::repository::error::RepositoryError;
use std::sync::{Mutex, MutexGuard};

pub struct BloodTypeLocks {
    locks: [Mutex<()>; 8],
}

impl BloodTypeLocks {
    pub fn new() -> Self {
        Self {
            locks: std::array::from_fn(|_| Mutex::new(())),
        }
    }

    /// 获取指定血型的锁（阻塞直至可用）
    pub fn acquire(&self, blood_type: BloodType) -> Result<MutexGuard<'_, ()>, RepositoryError> {
        self.locks[blood_type.index()]
            .lock()
            .map_err(|e| RepositoryError::LockError(format!("血型 {} 锁获取失败: {}", blood_type, e)))
    }
}

impl Default for BloodTypeLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_different_types_do_not_block() {
        let locks = BloodTypeLocks::new();
        let _a = locks.acquire(BloodType::APos).unwrap();
        let _o = locks.acquire(BloodType::ONeg).unwrap();
    }

    #[test]
    fn test_same_type_is_serialized() {
        let locks = Arc::new(BloodTypeLocks::new());
        let counter = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let locks = locks.clone();
                let counter = counter.clone();
                thread::spawn(move || {
                    let _guard = locks.acquire(BloodType::BPos).unwrap();
                    counter.lock().unwrap().push(("enter", i));
                    thread::sleep(std::time::Duration::from_millis(5));
                    counter.lock().unwrap().push(("leave", i));
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        // 进入/离开必须成对相邻出现
        let events = counter.lock().unwrap();
        for pair in events.chunks(2) {
            assert_eq!(pair[0].0, "enter");
            assert_eq!(pair[1].0, "leave");
            assert_eq!(pair[0].1, pair[1].1);
        }
    }
}
