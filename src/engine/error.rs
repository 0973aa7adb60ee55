// ==========================================
// 血库管理核心 - 引擎层错误类型
// ==========================================

use crate::domain::types::BloodType;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("库存不足: 血型={blood_type}, 需求={requested}, 可用={available}")]
    InsufficientStock {
        blood_type: BloodType,
        requested: u32,
        available: u32,
    },

    #[error("输入校验失败: {0}")]
    Validation(String),

    #[error("通知发送失败: {0}")]
    Notification(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type EngineResult<T> = Result<T, EngineError>;
