//! 节点主循环
//!
//! 每个 tick 的固定顺序：
//!
//! 1. 排空入站帧，逐帧交给指令匹配器
//! 2. 处理唤醒请求
//! 3. 若仍在休眠：低功耗等待 → 再次排空 → 再次处理唤醒，本 tick 结束
//! 4. 否则轮询所有到期传感器
//! 5. 处理休眠请求
//!
//! 同一 tick 内唤醒优先于休眠；休眠只在轮询结束后开始。

use crate::hooks::LifecycleHooks;
use crate::matcher::{CommandMatcher, ControlCommand};
use crate::metrics::{MetricsSnapshot, NodeMetrics};
use crate::power::{PowerContext, PowerStateMachine};
use crate::requests::PendingRequests;
use crate::scheduler::{PollReport, PollScheduler, SensorRuntime};
use crate::state::{AtomicNodeState, NodeState};
use crate::time::{Clock, LowPowerWait};
use canode_can::BusTransport;
use canode_protocol::ControlContract;
use spin_sleep::SpinSleeper;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, trace, warn};

/// 节点循环参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    /// 清醒状态下两个 tick 之间的空闲时间，0 表示忙循环
    pub tick_period: Duration,
    /// 单次排空最多处理的入站帧数（总线洪泛时保证 tick 能继续推进，最小为 1）
    pub max_frames_per_drain: usize,
}

impl NodeConfig {
    pub const DEFAULT_MAX_FRAMES_PER_DRAIN: usize = 256;
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(1),
            max_frames_per_drain: Self::DEFAULT_MAX_FRAMES_PER_DRAIN,
        }
    }
}

/// 单个 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 清醒 tick，执行了一次轮询
    Polled(PollReport),
    /// 休眠 tick，执行了一次低功耗等待
    Slept,
}

/// 跨线程控制句柄
///
/// 可克隆，`Send + Sync`。写入的请求与总线指令帧走同一组标志。
#[derive(Debug, Clone)]
pub struct NodeHandle {
    requests: Arc<PendingRequests>,
    state: Arc<AtomicNodeState>,
    metrics: Arc<NodeMetrics>,
    running: Arc<AtomicBool>,
}

impl NodeHandle {
    pub fn request_sleep(&self) {
        self.requests.request_sleep();
    }

    pub fn request_wake(&self) {
        self.requests.request_wake();
    }

    /// 最近一次发布的节点状态
    pub fn state(&self) -> NodeState {
        self.state.get()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 令 [`Node::run`] 在当前 tick 结束后返回
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// 传感器节点
///
/// 由 [`NodeBuilder`](crate::NodeBuilder) 构建；构建完成时收发器已初始化、
/// 传感器已 `begin` 并完成首次错峰。
pub struct Node<T: BusTransport> {
    pub(crate) transport: T,
    pub(crate) sensors: Vec<SensorRuntime>,
    pub(crate) matcher: Arc<CommandMatcher>,
    pub(crate) power: PowerStateMachine,
    pub(crate) scheduler: PollScheduler,
    pub(crate) hooks: LifecycleHooks,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) waiter: Box<dyn LowPowerWait>,
    pub(crate) config: NodeConfig,
    pub(crate) handle: NodeHandle,
}

impl<T: BusTransport> Node<T> {
    /// 执行一个 tick
    pub fn tick(&mut self) -> TickOutcome {
        NodeMetrics::incr(&self.handle.metrics.ticks);

        self.drain_inbound();
        self.process_wake();

        if self.power.state().is_sleeping() {
            self.waiter.wait_for_interrupt();
            self.drain_inbound();
            self.process_wake();
            return TickOutcome::Slept;
        }

        let now = self.clock.now_ms();
        let report = self.scheduler.poll(
            &mut self.sensors,
            now,
            &mut self.transport,
            &self.handle.metrics,
        );

        self.process_sleep();
        TickOutcome::Polled(report)
    }

    /// 持续执行 tick，直到 [`NodeHandle::stop`] 被调用
    ///
    /// 清醒状态下每个 tick 之后空闲 `tick_period`；休眠状态下由低功耗等待控制节奏。
    pub fn run(&mut self) {
        let sleeper = SpinSleeper::default();
        info!(
            "Node loop started: {} sensors, tick period {:?}",
            self.sensors.len(),
            self.config.tick_period
        );

        while self.handle.is_running() {
            if let TickOutcome::Polled(_) = self.tick()
                && !self.config.tick_period.is_zero()
            {
                sleeper.sleep(self.config.tick_period);
            }
        }

        info!("Node loop stopped in state {:?}", self.state());
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> NodeState {
        self.power.state()
    }

    pub fn sensors(&self) -> &[SensorRuntime] {
        &self.sensors
    }

    pub fn contract(&self) -> &ControlContract {
        self.matcher.contract()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.handle.metrics.snapshot()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// 服务接收中断并把队列中的帧交给匹配器
    ///
    /// 返回本次处理的帧数。
    fn drain_inbound(&mut self) -> usize {
        self.transport.service_interrupt();

        let limit = self.config.max_frames_per_drain.max(1);
        let metrics = &self.handle.metrics;
        let mut drained = 0;

        while drained < limit {
            match self.transport.try_receive() {
                Ok(Some(frame)) => {
                    drained += 1;
                    NodeMetrics::incr(&metrics.frames_received);
                    match self.matcher.handle_frame(&frame) {
                        Some(ControlCommand::Sleep) => NodeMetrics::incr(&metrics.sleep_commands),
                        Some(ControlCommand::Wake) => NodeMetrics::incr(&metrics.wake_commands),
                        None => {},
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("Inbound receive failed: {}", e);
                    break;
                },
            }
        }

        if drained == limit {
            trace!("Drain limit {} reached, remaining frames deferred", limit);
        }
        drained
    }

    fn process_wake(&mut self) -> bool {
        let mut ctx = PowerContext {
            transport: &mut self.transport,
            sensors: &mut self.sensors,
            scheduler: &self.scheduler,
            hooks: &mut self.hooks,
            clock: self.clock.as_ref(),
            metrics: &self.handle.metrics,
        };
        self.power.process_wake(&mut ctx)
    }

    fn process_sleep(&mut self) -> bool {
        let mut ctx = PowerContext {
            transport: &mut self.transport,
            sensors: &mut self.sensors,
            scheduler: &self.scheduler,
            hooks: &mut self.hooks,
            clock: self.clock.as_ref(),
            metrics: &self.handle.metrics,
        };
        self.power.process_sleep(&mut ctx)
    }
}

impl NodeHandle {
    pub(crate) fn new(
        requests: Arc<PendingRequests>,
        state: Arc<AtomicNodeState>,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        Self {
            requests,
            state,
            metrics,
            running: Arc::new(AtomicBool::new(true)),
        }
    }
}
