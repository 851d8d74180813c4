//! 时间源与低功耗等待

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 单调毫秒时钟
///
/// 时间戳使用 u64 毫秒，节点生命周期内不会回绕。
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// 基于 [`Instant`] 的单调时钟，以创建时刻为零点
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// 手动推进的时钟（测试、仿真用）
///
/// 克隆共享同一时间值，测试可以在节点持有时钟的同时推进它。
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// 低功耗等待
///
/// 休眠状态下每个 tick 调用一次，返回后节点立即重新检查唤醒请求。
/// 这是节点循环中唯一的挂起点。
pub trait LowPowerWait: Send {
    fn wait_for_interrupt(&mut self);
}

/// 固定延时等待
#[derive(Debug, Clone, Copy)]
pub struct DelayWait {
    period: Duration,
}

impl DelayWait {
    /// 默认等待 5ms
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(5);

    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for DelayWait {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PERIOD)
    }
}

impl LowPowerWait for DelayWait {
    fn wait_for_interrupt(&mut self) {
        if !self.period.is_zero() {
            spin_sleep::sleep(self.period);
        }
    }
}

/// 立即返回（测试用）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWait;

impl LowPowerWait for NoopWait {
    fn wait_for_interrupt(&mut self) {}
}
