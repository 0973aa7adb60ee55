// ==========================================
// 血库管理核心 - 领域枚举 <-> SQLite 映射
// ==========================================
// 说明: 枚举一律以 TEXT 存储; 读到未知值视为数据损坏,返回转换错误
// ==========================================

use crate::domain::types::{BatchStatus, BloodType, RequestPriority, RequestStatus, UrgencyLevel};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

macro_rules! text_enum_sql {
    ($ty:ty, $to:ident, $from:ident) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.$to()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                <$ty>::$from(raw).ok_or_else(|| {
                    FromSqlError::Other(
                        format!("无法识别的{}取值: {}", stringify!($ty), raw).into(),
                    )
                })
            }
        }
    };
}

text_enum_sql!(BloodType, as_str, parse);
text_enum_sql!(BatchStatus, to_db_str, from_db_str);
text_enum_sql!(RequestStatus, to_db_str, from_db_str);
text_enum_sql!(RequestPriority, to_db_str, from_db_str);
text_enum_sql!(UrgencyLevel, to_db_str, from_db_str);
