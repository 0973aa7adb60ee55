// ==========================================
// 血库管理核心 - 定位提供者
// ==========================================
// 职责: 为献血者给出用于距离排序的坐标
// 红线: 默认只使用档案登记坐标; 无坐标即"距离未知",不伪造
// 说明: DemoGeolocation 仅在 geolocation_mode = DEMO 时启用,
//       坐标由 (种子, donor_id 的 FNV-1a 哈希) 播种的随机抖动生成,
//       同一 rand 版本下同一献血者结果稳定
// ==========================================

use crate::config::GeolocationMode;
use crate::domain::donor::{DonorContact, GeoPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// 1 纬度约等于的公里数
const KM_PER_DEGREE: f64 = 111.0;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64 位哈希（跨平台、跨编译器版本固定）
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// 定位提供者 Trait
pub trait GeolocationProvider: Send + Sync {
    /// 献血者坐标
    ///
    /// # 参数
    /// - contact: 献血者联系资料
    /// - origin: 申请方坐标（演示模式以此为中心）
    ///
    /// # 返回
    /// - None 表示位置未知
    fn locate(&self, contact: &DonorContact, origin: Option<&GeoPoint>) -> Option<GeoPoint>;

    /// 模式标识（写入匹配原因）
    fn mode(&self) -> GeolocationMode;
}

// ==========================================
// ProfileGeolocation - 档案坐标（默认）
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileGeolocation;

impl GeolocationProvider for ProfileGeolocation {
    fn locate(&self, contact: &DonorContact, _origin: Option<&GeoPoint>) -> Option<GeoPoint> {
        contact.location.filter(|p| p.is_valid())
    }

    fn mode(&self) -> GeolocationMode {
        GeolocationMode::Profile
    }
}

// ==========================================
// DemoGeolocation - 演示用随机坐标
// ==========================================
#[derive(Debug, Clone)]
pub struct DemoGeolocation {
    seed: u64,
    radius_km: f64,
    fallback_center: GeoPoint,
}

impl DemoGeolocation {
    pub fn new(seed: u64, radius_km: f64, fallback_center: GeoPoint) -> Self {
        Self {
            seed,
            radius_km: radius_km.abs(),
            fallback_center,
        }
    }

    fn rng_for(&self, donor_id: &str) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ fnv1a(donor_id.as_bytes()))
    }
}

impl Default for DemoGeolocation {
    fn default() -> Self {
        Self::new(42, 50.0, GeoPoint::new(0.0, 0.0))
    }
}

impl GeolocationProvider for DemoGeolocation {
    fn locate(&self, contact: &DonorContact, origin: Option<&GeoPoint>) -> Option<GeoPoint> {
        let center = origin.copied().unwrap_or(self.fallback_center);
        let mut rng = self.rng_for(&contact.donor_id);
        let span = self.radius_km / KM_PER_DEGREE;

        let lat = (center.latitude + rng.gen_range(-span..=span)).clamp(-90.0, 90.0);
        let lon = (center.longitude + rng.gen_range(-span..=span)).clamp(-180.0, 180.0);
        Some(GeoPoint::new(lat, lon))
    }

    fn mode(&self) -> GeolocationMode {
        GeolocationMode::Demo
    }
}

/// 按配置模式构造定位提供者
pub fn provider_for(mode: GeolocationMode) -> Arc<dyn GeolocationProvider> {
    match mode {
        GeolocationMode::Profile => Arc::new(ProfileGeolocation),
        GeolocationMode::Demo => {
            tracing::warn!("定位模式为 DEMO: 献血者距离为随机演示数据");
            Arc::new(DemoGeolocation::default())
        }
    }
}
