//! 电源状态机
//!
//! 唯一能改变 [`NodeState`] 的组件。休眠/唤醒请求由 [`PendingRequests`]
//! 异步写入，状态机在节点循环中消费它们并执行切换时序：
//!
//! ```text
//! Awake ──sleep_requested──▶ Sleeping
//!   suspend 所有传感器 → before_sleep 钩子
//!   → clear_wake_flag → arm_wake_interrupt → STBY 拉高 → 低功耗模式
//!
//! Sleeping ──wake_requested──▶ Awake
//!   清除两个请求 → STBY 拉低 → clear_wake_flag → 正常模式
//!   → 重新错峰 → resume 所有传感器 → after_wake 钩子
//! ```
//!
//! 已处于目标状态时的请求被直接消费，不产生任何副作用。
//! 切换过程中收发器返回的错误只记录警告，切换仍然完成。

use crate::hooks::{LifecycleHooks, LifecyclePoint};
use crate::metrics::NodeMetrics;
use crate::requests::PendingRequests;
use crate::scheduler::{PollScheduler, SensorRuntime};
use crate::state::{AtomicNodeState, NodeState};
use crate::time::Clock;
use canode_can::{BusTransport, CanError};
use std::sync::Arc;
use tracing::{info, warn};

/// 状态切换时借用的节点资源
pub struct PowerContext<'a, T: BusTransport + ?Sized> {
    pub transport: &'a mut T,
    pub sensors: &'a mut [SensorRuntime],
    pub scheduler: &'a PollScheduler,
    pub hooks: &'a mut LifecycleHooks,
    pub clock: &'a dyn Clock,
    pub metrics: &'a NodeMetrics,
}

/// 电源状态机
#[derive(Debug)]
pub struct PowerStateMachine {
    state: NodeState,
    requests: Arc<PendingRequests>,
    published: Arc<AtomicNodeState>,
}

impl PowerStateMachine {
    pub fn new(requests: Arc<PendingRequests>, published: Arc<AtomicNodeState>) -> Self {
        published.set(NodeState::Awake);
        Self {
            state: NodeState::Awake,
            requests,
            published,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// 处理唤醒请求
    ///
    /// 返回是否发生了 Sleeping → Awake 切换。
    pub fn process_wake<T>(&mut self, ctx: &mut PowerContext<'_, T>) -> bool
    where
        T: BusTransport + ?Sized,
    {
        if !self.requests.wake_requested() {
            return false;
        }

        if self.state.is_awake() {
            // 只消费唤醒请求，并发写入的休眠请求留给 process_sleep
            self.requests.clear_wake();
            return false;
        }
        self.requests.clear_all();

        if ctx.transport.wake_detected() {
            NodeMetrics::incr(&ctx.metrics.wake_detects);
        }

        ctx.transport.set_standby(false);
        ctx.transport.clear_wake_flag();
        log_transition_error("enter normal mode", ctx.transport.enter_normal_mode());

        self.set_state(NodeState::Awake);

        let now = ctx.clock.now_ms();
        ctx.scheduler.stagger(ctx.sensors, now);
        for sensor in ctx.sensors.iter_mut() {
            sensor.spec_mut().resume();
        }
        ctx.hooks.run(LifecyclePoint::AfterWake);

        NodeMetrics::incr(&ctx.metrics.wake_transitions);
        info!("Node awake at t={}ms, sensors restaggered", now);
        true
    }

    /// 处理休眠请求
    ///
    /// 返回是否发生了 Awake → Sleeping 切换。
    pub fn process_sleep<T>(&mut self, ctx: &mut PowerContext<'_, T>) -> bool
    where
        T: BusTransport + ?Sized,
    {
        if !self.requests.sleep_requested() {
            return false;
        }

        if self.state.is_sleeping() {
            self.requests.clear_sleep();
            return false;
        }

        for sensor in ctx.sensors.iter_mut() {
            sensor.spec_mut().suspend();
        }
        ctx.hooks.run(LifecyclePoint::BeforeSleep);

        // 先使能唤醒中断再拉起 STBY，避免唤醒边沿丢失
        ctx.transport.clear_wake_flag();
        log_transition_error("arm wake interrupt", ctx.transport.arm_wake_interrupt());
        ctx.transport.set_standby(true);
        log_transition_error("enter low-power mode", ctx.transport.enter_low_power_mode());

        self.set_state(NodeState::Sleeping);
        self.requests.clear_sleep();

        NodeMetrics::incr(&ctx.metrics.sleep_transitions);
        info!("Node entering sleep");
        true
    }

    fn set_state(&mut self, state: NodeState) {
        self.state = state;
        self.published.set(state);
    }
}

fn log_transition_error(step: &str, result: Result<(), CanError>) {
    if let Err(e) = result {
        warn!("Transport failed to {} during power transition: {}", step, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{SensorDriver, SensorError, SensorHeader, SensorSpec};
    use crate::time::ManualClock;
    use canode_can::{MockTransport, TransportCall, TransportMode};
    use canode_protocol::{IdKind, NodeFrame};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Suspend(&'static str),
        Resume(&'static str),
        Hook(LifecyclePoint),
    }

    type Log = Arc<Mutex<Vec<Event>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl SensorDriver for Recorder {
        fn begin(&mut self, _header: &SensorHeader) -> Result<(), SensorError> {
            Ok(())
        }

        fn sample(
            &mut self,
            _header: &SensorHeader,
            _frame: &mut NodeFrame,
        ) -> Result<(), SensorError> {
            Ok(())
        }

        fn suspend(&mut self, _header: &SensorHeader) {
            self.log.lock().unwrap().push(Event::Suspend(self.name));
        }

        fn resume(&mut self, _header: &SensorHeader) {
            self.log.lock().unwrap().push(Event::Resume(self.name));
        }
    }

    struct Fixture {
        machine: PowerStateMachine,
        requests: Arc<PendingRequests>,
        published: Arc<AtomicNodeState>,
        transport: MockTransport,
        sensors: Vec<SensorRuntime>,
        scheduler: PollScheduler,
        hooks: LifecycleHooks,
        clock: ManualClock,
        metrics: NodeMetrics,
        log: Log,
    }

    impl Fixture {
        fn new() -> Self {
            let log: Log = Arc::default();
            let sensors = ["a", "b"]
                .into_iter()
                .enumerate()
                .map(|(i, name)| {
                    SensorRuntime::new(SensorSpec::new(
                        SensorHeader::new(name, i as u32 + 1, 100),
                        Recorder {
                            name,
                            log: Arc::clone(&log),
                        },
                    ))
                })
                .collect();

            let before = Arc::clone(&log);
            let after = Arc::clone(&log);
            let hooks = LifecycleHooks::new()
                .with_before_sleep(move || {
                    before.lock().unwrap().push(Event::Hook(LifecyclePoint::BeforeSleep))
                })
                .with_after_wake(move || {
                    after.lock().unwrap().push(Event::Hook(LifecyclePoint::AfterWake))
                });

            let mut transport = MockTransport::new();
            transport.begin().unwrap();

            let requests = Arc::new(PendingRequests::new());
            let published = Arc::new(AtomicNodeState::default());
            Self {
                machine: PowerStateMachine::new(Arc::clone(&requests), Arc::clone(&published)),
                requests,
                published,
                transport,
                sensors,
                scheduler: PollScheduler::new(IdKind::Standard),
                hooks,
                clock: ManualClock::new(0),
                metrics: NodeMetrics::new(),
                log,
            }
        }

        fn sleep(&mut self) -> bool {
            let mut ctx = PowerContext {
                transport: &mut self.transport,
                sensors: &mut self.sensors,
                scheduler: &self.scheduler,
                hooks: &mut self.hooks,
                clock: &self.clock,
                metrics: &self.metrics,
            };
            self.machine.process_sleep(&mut ctx)
        }

        fn wake(&mut self) -> bool {
            let mut ctx = PowerContext {
                transport: &mut self.transport,
                sensors: &mut self.sensors,
                scheduler: &self.scheduler,
                hooks: &mut self.hooks,
                clock: &self.clock,
                metrics: &self.metrics,
            };
            self.machine.process_wake(&mut ctx)
        }

        fn take_log(&self) -> Vec<Event> {
            std::mem::take(&mut *self.log.lock().unwrap())
        }
    }

    #[test]
    fn test_no_request_no_transition() {
        let mut f = Fixture::new();
        assert!(!f.sleep());
        assert!(!f.wake());
        assert_eq!(f.machine.state(), NodeState::Awake);
        assert!(f.take_log().is_empty());
    }

    #[test]
    fn test_sleep_sequence() {
        let mut f = Fixture::new();
        let bus = f.transport.handle();
        bus.clear_calls();

        f.requests.request_sleep();
        assert!(f.sleep());

        assert_eq!(f.machine.state(), NodeState::Sleeping);
        assert_eq!(f.published.get(), NodeState::Sleeping);
        assert!(!f.requests.sleep_requested());
        assert_eq!(
            f.take_log(),
            vec![
                Event::Suspend("a"),
                Event::Suspend("b"),
                Event::Hook(LifecyclePoint::BeforeSleep),
            ]
        );
        assert_eq!(
            bus.calls(),
            vec![
                TransportCall::ClearWakeFlag,
                TransportCall::ArmWakeInterrupt,
                TransportCall::SetStandby(true),
                TransportCall::EnterLowPowerMode,
            ]
        );
        assert_eq!(bus.mode(), TransportMode::LowPower);
        assert_eq!(f.metrics.snapshot().sleep_transitions, 1);
    }

    #[test]
    fn test_wake_sequence_restaggers_from_resume_instant() {
        let mut f = Fixture::new();
        let bus = f.transport.handle();
        f.requests.request_sleep();
        f.sleep();
        f.take_log();
        bus.clear_calls();

        f.clock.set(5_000);
        f.requests.request_wake();
        assert!(f.wake());

        assert_eq!(f.machine.state(), NodeState::Awake);
        assert_eq!(f.published.get(), NodeState::Awake);
        assert!(!f.requests.wake_requested());
        assert!(!f.requests.sleep_requested());
        assert_eq!(
            bus.calls(),
            vec![
                TransportCall::SetStandby(false),
                TransportCall::ClearWakeFlag,
                TransportCall::EnterNormalMode,
            ]
        );
        assert_eq!(
            f.take_log(),
            vec![
                Event::Resume("a"),
                Event::Resume("b"),
                Event::Hook(LifecyclePoint::AfterWake),
            ]
        );
        assert_eq!(f.sensors[0].next_due(), Some(5_000));
        assert_eq!(f.sensors[1].next_due(), Some(5_050));
        assert_eq!(f.metrics.snapshot().wake_transitions, 1);
    }

    #[test]
    fn test_redundant_requests_are_consumed_silently() {
        let mut f = Fixture::new();
        let bus = f.transport.handle();
        bus.clear_calls();

        // 清醒时的唤醒请求
        f.requests.request_wake();
        assert!(!f.wake());
        assert!(!f.requests.wake_requested());

        f.requests.request_sleep();
        assert!(f.sleep());
        f.take_log();
        bus.clear_calls();

        // 休眠时的休眠请求
        f.requests.request_sleep();
        assert!(!f.sleep());
        assert!(!f.requests.sleep_requested());

        assert!(f.take_log().is_empty());
        assert!(bus.calls().is_empty());
        assert_eq!(f.metrics.snapshot().sleep_transitions, 1);
    }

    #[test]
    fn test_redundant_wake_keeps_concurrent_sleep_request() {
        let mut f = Fixture::new();
        // 唤醒请求读取后、清除前，另一写入方写入了休眠请求
        f.requests.force(true, true);

        assert!(!f.wake());
        assert!(!f.requests.wake_requested());
        assert!(f.requests.sleep_requested());

        assert!(f.sleep());
        assert_eq!(f.machine.state(), NodeState::Sleeping);
    }

    #[test]
    fn test_hardware_wake_detect_counted() {
        let mut f = Fixture::new();
        let bus = f.transport.handle();
        f.requests.request_sleep();
        f.sleep();

        assert!(bus.raise_wake_detect());
        // 未注册监听器时由测试代为写入请求
        f.requests.request_wake();
        assert!(f.wake());
        assert_eq!(f.metrics.snapshot().wake_detects, 1);
        assert!(!bus.wake_flag());
    }
}
