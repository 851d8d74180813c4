//! 节点运行计数器
//!
//! 所有计数器只由节点循环线程递增（Relaxed），其他线程通过
//! [`NodeMetrics::snapshot`] 读取近似一致的快照。

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct NodeMetrics {
    pub frames_received: AtomicU64,
    pub sleep_commands: AtomicU64,
    pub wake_commands: AtomicU64,
    pub wake_detects: AtomicU64,
    pub frames_sent: AtomicU64,
    pub send_failures: AtomicU64,
    pub sample_failures: AtomicU64,
    pub begin_failures: AtomicU64,
    pub sleep_transitions: AtomicU64,
    pub wake_transitions: AtomicU64,
    pub ticks: AtomicU64,
}

/// 计数器快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub sleep_commands: u64,
    pub wake_commands: u64,
    pub wake_detects: u64,
    pub frames_sent: u64,
    pub send_failures: u64,
    pub sample_failures: u64,
    pub begin_failures: u64,
    pub sleep_transitions: u64,
    pub wake_transitions: u64,
    pub ticks: u64,
}

impl NodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            sleep_commands: self.sleep_commands.load(Ordering::Relaxed),
            wake_commands: self.wake_commands.load(Ordering::Relaxed),
            wake_detects: self.wake_detects.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            sample_failures: self.sample_failures.load(Ordering::Relaxed),
            begin_failures: self.begin_failures.load(Ordering::Relaxed),
            sleep_transitions: self.sleep_transitions.load(Ordering::Relaxed),
            wake_transitions: self.wake_transitions.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// 发送尝试总数（成功 + 失败）
    pub fn send_attempts(&self) -> u64 {
        self.frames_sent + self.send_failures
    }
}
