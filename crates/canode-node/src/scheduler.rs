//! 错峰轮询调度
//!
//! 每个活动传感器（周期非 0）在初始化和每次唤醒时获得一个相位偏移：
//! 第 i 个活动传感器的首次触发时刻为 `now + interval_i * i / N`，
//! 避免所有传感器在同一时刻采样和发送。
//!
//! 稳态下到期即触发，下次到期时刻按周期累加；若因长时间阻塞仍落后于当前时刻，
//! 直接对齐到 `now + interval`，不做连续补发。

use crate::metrics::NodeMetrics;
use crate::sensor::SensorSpec;
use canode_can::BusTransport;
use canode_protocol::{IdKind, NodeFrame};
use tracing::{debug, trace, warn};

/// 传感器运行时条目：配置 + 下次到期时刻
#[derive(Debug)]
pub struct SensorRuntime {
    spec: SensorSpec,
    /// `None` 表示从未调度（周期为 0 的传感器始终为 `None`）
    next_due: Option<u64>,
}

impl SensorRuntime {
    pub fn new(spec: SensorSpec) -> Self {
        Self {
            spec,
            next_due: None,
        }
    }

    pub fn spec(&self) -> &SensorSpec {
        &self.spec
    }

    pub(crate) fn spec_mut(&mut self) -> &mut SensorSpec {
        &mut self.spec
    }

    pub fn next_due(&self) -> Option<u64> {
        self.next_due
    }

    /// 当前时刻是否到期
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.next_due.is_some_and(|due| now_ms >= due)
    }
}

/// 第 `index` 个活动传感器（共 `active` 个）的相位偏移
pub fn stagger_offset(interval_ms: u32, index: usize, active: usize) -> u64 {
    if active == 0 {
        return 0;
    }
    interval_ms as u64 * index as u64 / active as u64
}

/// 触发后的下次到期时刻
///
/// 按周期累加；若结果仍不晚于 `now`，对齐到 `now + interval`。
pub fn next_due_after_fire(due_ms: u64, interval_ms: u32, now_ms: u64) -> u64 {
    let interval = interval_ms as u64;
    let next = due_ms.saturating_add(interval);
    if next <= now_ms {
        now_ms.saturating_add(interval)
    } else {
        next
    }
}

/// 一次轮询的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// 到期触发的传感器数
    pub fired: usize,
    /// 成功发送的帧数
    pub sent: usize,
    pub sample_failures: usize,
    pub send_failures: usize,
}

/// 轮询调度器
#[derive(Debug, Clone, Copy)]
pub struct PollScheduler {
    /// 数据帧的标识符格式（与控制约定一致，整个节点统一）
    kind: IdKind,
}

impl PollScheduler {
    pub fn new(kind: IdKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> IdKind {
        self.kind
    }

    /// 为所有活动传感器重新计算错峰的首次到期时刻
    pub fn stagger(&self, sensors: &mut [SensorRuntime], now_ms: u64) {
        let active = sensors.iter().filter(|s| s.spec.is_active()).count();

        let mut index = 0;
        for sensor in sensors.iter_mut() {
            let interval = sensor.spec.poll_interval_ms();
            if interval == 0 {
                sensor.next_due = None;
                continue;
            }
            let offset = stagger_offset(interval, index, active);
            sensor.next_due = Some(now_ms + offset);
            trace!(
                "Sensor '{}' staggered: offset={}ms, first due at {}",
                sensor.spec.name(),
                offset,
                now_ms + offset
            );
            index += 1;
        }
    }

    /// 按配置顺序触发所有到期传感器
    ///
    /// 每个到期传感器：构造空帧 → `sample` → 成功则发送。
    /// 采样失败的帧被丢弃；发送失败不重试。两者都不影响下次到期时刻。
    pub fn poll<T>(
        &self,
        sensors: &mut [SensorRuntime],
        now_ms: u64,
        transport: &mut T,
        metrics: &NodeMetrics,
    ) -> PollReport
    where
        T: BusTransport + ?Sized,
    {
        let mut report = PollReport::default();

        for sensor in sensors.iter_mut() {
            let Some(due) = sensor.next_due else {
                continue;
            };
            if now_ms < due {
                continue;
            }

            report.fired += 1;
            sensor.next_due = Some(next_due_after_fire(
                due,
                sensor.spec.poll_interval_ms(),
                now_ms,
            ));

            let mut frame = NodeFrame::empty(sensor.spec.can_id(), self.kind);
            if let Err(e) = sensor.spec.sample(&mut frame) {
                debug!("Sensor '{}' sample failed: {}", sensor.spec.name(), e);
                NodeMetrics::incr(&metrics.sample_failures);
                report.sample_failures += 1;
                continue;
            }

            match transport.send(&frame) {
                Ok(()) => {
                    trace!("Sensor '{}' sent {}", sensor.spec.name(), frame);
                    NodeMetrics::incr(&metrics.frames_sent);
                    report.sent += 1;
                },
                Err(e) => {
                    warn!(
                        "Sensor '{}' frame ID=0x{:X} dropped: {}",
                        sensor.spec.name(),
                        frame.id,
                        e
                    );
                    NodeMetrics::incr(&metrics.send_failures);
                    report.send_failures += 1;
                },
            }
        }

        report
    }
}
