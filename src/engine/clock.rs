// ==========================================
// 血库管理核心 - 时钟
// ==========================================
// 职责: 统一"今天/现在"的来源
// 说明: 42 天保存期与 56 天献血间隔都依赖时钟,测试注入 FixedClock
// ==========================================

use chrono::{Local, NaiveDate, NaiveDateTime};

/// 时钟 Trait
pub trait Clock: Send + Sync {
    /// 当前日期
    fn today(&self) -> NaiveDate;

    /// 当前时间
    fn now(&self) -> NaiveDateTime;
}

/// 系统本地时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// 固定时钟（测试 / 回放）
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: NaiveDateTime,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    /// 固定在某日 08:00
    pub fn on_date(date: NaiveDate) -> Self {
        Self {
            now: date.and_hms_opt(8, 0, 0).unwrap_or_default(),
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.now.date()
    }

    fn now(&self) -> NaiveDateTime {
        self.now
    }
}
