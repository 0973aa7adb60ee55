// ==========================================
// 血库管理核心 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把仓储/引擎错误转换为调用方可处理的分类
// 分类: NotFound / InsufficientStock / ValidationError / DependencyFailure
// 约束: 所有错误均按操作粒度返回,不会导致进程退出
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("库存不足: 血型={blood_type}, 需求={requested}, 可用={available}")]
    InsufficientStock {
        blood_type: String,
        requested: u32,
        available: u32,
    },

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 并发控制错误
    // ==========================================
    /// 其他写入者已修改同一记录; 事务已回滚
    #[error("并发修改冲突: {0}")]
    ConcurrentModification(String),

    // ==========================================
    // 依赖错误
    // ==========================================
    /// 持久化/通知依赖不可用
    ///
    /// unconfirmed = true 表示写操作结果未确认,重试前必须先重新校验
    #[error("依赖失败: operation={operation}, unconfirmed={unconfirmed}: {message}")]
    DependencyFailure {
        operation: String,
        unconfirmed: bool,
        message: String,
    },

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    /// 构造依赖失败
    pub fn dependency(operation: &str, unconfirmed: bool, message: impl Into<String>) -> Self {
        ApiError::DependencyFailure {
            operation: operation.to_string(),
            unconfirmed,
            message: message.into(),
        }
    }

    /// 标记为写路径错误: 依赖失败的结果视为未确认
    pub fn on_write(self, operation: &str) -> Self {
        match self {
            ApiError::DependencyFailure { message, .. } => ApiError::DependencyFailure {
                operation: operation.to_string(),
                unconfirmed: true,
                message,
            },
            other => other,
        }
    }

    /// 重新校验可用量/状态后是否可以重试
    ///
    /// 校验类与状态类错误重试也不会成功
    pub fn is_retry_safe_after_recheck(&self) -> bool {
        matches!(
            self,
            ApiError::DependencyFailure { .. }
                | ApiError::ConcurrentModification(_)
                | ApiError::InsufficientStock { .. }
        )
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure { entity, id, detail } => {
                ApiError::ConcurrentModification(format!("{}(id={}): {}", entity, id, detail))
            }

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => {
                ApiError::dependency("database", false, msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::dependency("database", false, format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ValidationError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::ValidationError(format!("外键约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::dependency("database", false, err.to_string()),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InsufficientStock {
                blood_type,
                requested,
                available,
            } => ApiError::InsufficientStock {
                blood_type: blood_type.to_string(),
                requested,
                available,
            },
            EngineError::Validation(msg) => ApiError::ValidationError(msg),
            EngineError::Notification(msg) => ApiError::dependency("notification", false, msg),
            EngineError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::BloodType;

    #[test]
    fn test_insufficient_stock_mapping() {
        let err: ApiError = EngineError::InsufficientStock {
            blood_type: BloodType::ONeg,
            requested: 5,
            available: 3,
        }
        .into();

        match &err {
            ApiError::InsufficientStock {
                blood_type,
                requested,
                available,
            } => {
                assert_eq!(blood_type, "O-");
                assert_eq!(*requested, 5);
                assert_eq!(*available, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(err.is_retry_safe_after_recheck());
    }

    #[test]
    fn test_write_failure_is_unconfirmed() {
        let err: ApiError =
            RepositoryError::DatabaseTransactionError("disk I/O error".to_string()).into();
        match err.on_write("approve_request") {
            ApiError::DependencyFailure {
                operation,
                unconfirmed,
                ..
            } => {
                assert_eq!(operation, "approve_request");
                assert!(unconfirmed);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_validation_not_retryable() {
        let err: ApiError = RepositoryError::ValidationError("bad".to_string()).into();
        assert!(!err.is_retry_safe_after_recheck());

        let err: ApiError = RepositoryError::not_found("Donor", "D-1").into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
