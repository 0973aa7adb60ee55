// ==========================================
// 血库管理核心 - 输入校验
// ==========================================
// 职责: 在任何写入之前拒绝非法输入
// 覆盖: 血型、优先级、单位数、姓名/医院名、邮箱、坐标
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::donor::GeoPoint;
use crate::domain::types::{BloodType, RequestPriority, RequestStatus};

/// 单次申请单位数上限
pub const MAX_UNITS_PER_REQUEST: i64 = 100;

/// 名称长度上限
const MAX_NAME_LEN: usize = 200;

/// 解析血型
pub fn parse_blood_type(raw: &str) -> ApiResult<BloodType> {
    BloodType::parse(raw).ok_or_else(|| ApiError::ValidationError(format!("未知血型: '{}'", raw)))
}

/// 解析申请优先级（大小写不敏感）
pub fn parse_priority(raw: &str) -> ApiResult<RequestPriority> {
    RequestPriority::from_db_str(raw)
        .ok_or_else(|| ApiError::ValidationError(format!("未知优先级: '{}'", raw)))
}

/// 解析申请状态（大小写不敏感）
pub fn parse_request_status(raw: &str) -> ApiResult<RequestStatus> {
    RequestStatus::from_db_str(raw)
        .ok_or_else(|| ApiError::ValidationError(format!("未知申请状态: '{}'", raw)))
}

/// 校验单位数: 1..=MAX_UNITS_PER_REQUEST
pub fn validate_units(units: i64) -> ApiResult<u32> {
    if units <= 0 {
        return Err(ApiError::ValidationError(format!(
            "单位数必须为正数: {}",
            units
        )));
    }
    if units > MAX_UNITS_PER_REQUEST {
        return Err(ApiError::ValidationError(format!(
            "单位数超过上限 {}: {}",
            MAX_UNITS_PER_REQUEST, units
        )));
    }
    // 已确认在 1..=100 内
    Ok(units as u32)
}

/// 校验必填名称（去首尾空白后非空,长度受限）
pub fn validate_name(field: &str, raw: &str) -> ApiResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::ValidationError(format!("{}不能为空", field)));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::ValidationError(format!(
            "{}长度超过 {} 字符",
            field, MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// 校验可选邮箱; 空串视为未填写
pub fn validate_email(raw: Option<&str>) -> ApiResult<Option<String>> {
    let value = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(v) => v,
    };

    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(Some(value.to_string()))
    } else {
        Err(ApiError::ValidationError(format!("邮箱格式错误: '{}'", value)))
    }
}

/// 校验可选坐标
pub fn validate_location(location: Option<GeoPoint>) -> ApiResult<Option<GeoPoint>> {
    match location {
        Some(p) if !p.is_valid() => Err(ApiError::ValidationError(format!(
            "坐标越界: lat={}, lon={}",
            p.latitude, p.longitude
        ))),
        other => Ok(other),
    }
}

/// 去除空白后为空则视为 None
pub fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blood_type_and_priority() {
        assert_eq!(parse_blood_type("ab+").unwrap(), BloodType::ABPos);
        assert!(matches!(parse_blood_type("Z"), Err(ApiError::ValidationError(_))));
        assert_eq!(parse_priority("critical").unwrap(), RequestPriority::Critical);
        // 旧词表 normal/urgent 不再接受
        assert!(parse_priority("urgent").is_err());
        assert_eq!(parse_request_status("pending").unwrap(), RequestStatus::Pending);
    }

    #[test]
    fn test_validate_units() {
        assert_eq!(validate_units(3).unwrap(), 3);
        assert!(validate_units(0).is_err());
        assert!(validate_units(-2).is_err());
        assert!(validate_units(MAX_UNITS_PER_REQUEST + 1).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(None).unwrap(), None);
        assert_eq!(validate_email(Some("  ")).unwrap(), None);
        assert_eq!(
            validate_email(Some(" a@b.org ")).unwrap().as_deref(),
            Some("a@b.org")
        );
        assert!(validate_email(Some("no-at-sign")).is_err());
        assert!(validate_email(Some("x@localhost")).is_err());
    }

    #[test]
    fn test_validate_name_and_location() {
        assert_eq!(validate_name("姓名", "  Ann  ").unwrap(), "Ann");
        assert!(validate_name("姓名", "   ").is_err());
        assert!(validate_location(Some(GeoPoint::new(91.0, 0.0))).is_err());
        assert!(validate_location(None).unwrap().is_none());
    }
}
