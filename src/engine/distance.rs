// ==========================================
// 血库管理核心 - 距离估算
// ==========================================
// 公式: haversine 大圆距离, 地球半径 6371 km
// ==========================================

use crate::domain::donor::GeoPoint;

/// 地球平均半径（公里）
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// 两点间大圆距离（公里）
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// GeoPoint 版本
pub fn distance_between(from: &GeoPoint, to: &GeoPoint) -> f64 {
    distance_km(from.latitude, from.longitude, to.latitude, to.longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        assert!(distance_km(31.23, 121.47, 31.23, 121.47).abs() < 1e-9);
    }

    #[test]
    fn test_symmetric() {
        let a = distance_km(51.5074, -0.1278, 48.8566, 2.3522);
        let b = distance_km(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_london_paris() {
        // 伦敦 - 巴黎 约 343.5 km
        let d = distance_km(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((d - 343.5).abs() < 1.0, "d={}", d);
    }

    #[test]
    fn test_quarter_meridian() {
        // 赤道到北极 = πR/2
        let d = distance_between(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(90.0, 0.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM / 2.0).abs() < 1e-6);
    }
}
