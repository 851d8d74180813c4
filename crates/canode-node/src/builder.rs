//! Builder 模式实现
//!
//! 提供链式构造 [`Node`] 的方式，并按固定顺序完成启动：
//!
//! 1. 校验控制约定与传感器 ID
//! 2. pre-setup 钩子
//! 3. 注册唤醒监听器，初始化收发器（失败即返回错误）
//! 4. 逐个 `begin` 传感器（失败只记录）
//! 5. 首次错峰

use crate::error::NodeError;
use crate::hooks::{LifecycleHooks, LifecyclePoint};
use crate::matcher::CommandMatcher;
use crate::metrics::NodeMetrics;
use crate::node::{Node, NodeConfig, NodeHandle};
use crate::power::PowerStateMachine;
use crate::requests::PendingRequests;
use crate::scheduler::{PollScheduler, SensorRuntime};
use crate::sensor::SensorSpec;
use crate::state::AtomicNodeState;
use crate::time::{Clock, DelayWait, LowPowerWait, MonotonicClock};
use canode_can::{BusTransport, WakeListener};
use canode_protocol::ControlContract;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 节点 Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// # #[cfg(target_os = "linux")]
/// # fn main() -> Result<(), canode_node::NodeError> {
/// use canode_can::SocketCanTransport;
/// use canode_node::NodeBuilder;
/// use canode_protocol::ControlContract;
///
/// let transport = SocketCanTransport::new("can0");
/// let mut node = NodeBuilder::new(transport)
///     .contract(ControlContract::default())
///     .on_after_wake(|| println!("awake"))
///     .build()?;
///
/// let handle = node.handle();
/// handle.stop();
/// node.run();
/// # Ok(())
/// # }
/// # #[cfg(not(target_os = "linux"))]
/// # fn main() {}
/// ```
pub struct NodeBuilder<T: BusTransport> {
    transport: T,
    contract: ControlContract,
    sensors: Vec<SensorSpec>,
    hooks: LifecycleHooks,
    clock: Option<Box<dyn Clock>>,
    waiter: Option<Box<dyn LowPowerWait>>,
    config: NodeConfig,
}

impl<T: BusTransport> NodeBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            contract: ControlContract::default(),
            sensors: Vec::new(),
            hooks: LifecycleHooks::new(),
            clock: None,
            waiter: None,
            config: NodeConfig::default(),
        }
    }

    /// 设置控制约定（默认 [`ControlContract::default`]）
    #[must_use]
    pub fn contract(mut self, contract: ControlContract) -> Self {
        self.contract = contract;
        self
    }

    /// 追加一个传感器（按追加顺序轮询）
    #[must_use]
    pub fn sensor(mut self, spec: SensorSpec) -> Self {
        self.sensors.push(spec);
        self
    }

    #[must_use]
    pub fn sensors(mut self, specs: impl IntoIterator<Item = SensorSpec>) -> Self {
        self.sensors.extend(specs);
        self
    }

    /// 整体替换生命周期钩子
    #[must_use]
    pub fn hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn on_pre_setup(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.hooks = self.hooks.with_pre_setup(hook);
        self
    }

    #[must_use]
    pub fn on_before_sleep(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.hooks = self.hooks.with_before_sleep(hook);
        self
    }

    #[must_use]
    pub fn on_after_wake(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.hooks = self.hooks.with_after_wake(hook);
        self
    }

    /// 时间源（默认 [`MonotonicClock`]）
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// 低功耗等待（默认 [`DelayWait`]，5ms）
    #[must_use]
    pub fn low_power_wait(mut self, waiter: impl LowPowerWait + 'static) -> Self {
        self.waiter = Some(Box::new(waiter));
        self
    }

    #[must_use]
    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// 构建节点
    ///
    /// # Errors
    /// - `NodeError::Contract`: 控制约定不自洽
    /// - `NodeError::InvalidSensorId`: 传感器 ID 超出标识符格式范围
    /// - `NodeError::TransportInit`: 收发器初始化失败
    pub fn build(self) -> Result<Node<T>, NodeError> {
        let NodeBuilder {
            mut transport,
            contract,
            sensors,
            mut hooks,
            clock,
            waiter,
            config,
        } = self;

        contract.validate()?;
        if let Some(spec) = sensors.iter().find(|s| !contract.kind.accepts(s.can_id())) {
            return Err(NodeError::InvalidSensorId {
                name: spec.name().to_string(),
                can_id: spec.can_id(),
                kind: contract.kind,
            });
        }

        hooks.run(LifecyclePoint::PreSetup);

        let requests = Arc::new(PendingRequests::new());
        let matcher = Arc::new(CommandMatcher::new(contract, Arc::clone(&requests)));
        transport.set_wake_listener(Arc::clone(&matcher) as Arc<dyn WakeListener>);

        if let Err(e) = transport.begin() {
            error!("Transport initialization failed: {}", e);
            return Err(NodeError::TransportInit(e));
        }

        let metrics = Arc::new(NodeMetrics::new());
        let mut runtimes: Vec<SensorRuntime> = sensors.into_iter().map(SensorRuntime::new).collect();
        for sensor in runtimes.iter_mut() {
            if let Err(e) = sensor.spec_mut().begin() {
                warn!(
                    "Sensor '{}' failed to initialize, keeping it scheduled: {}",
                    sensor.spec().name(),
                    e
                );
                NodeMetrics::incr(&metrics.begin_failures);
            }
        }

        let clock = clock.unwrap_or_else(|| Box::new(MonotonicClock::new()));
        let waiter = waiter.unwrap_or_else(|| Box::new(DelayWait::default()));

        let scheduler = PollScheduler::new(contract.kind);
        scheduler.stagger(&mut runtimes, clock.now_ms());

        let state = Arc::new(AtomicNodeState::default());
        let power = PowerStateMachine::new(Arc::clone(&requests), Arc::clone(&state));
        let handle = NodeHandle::new(requests, state, metrics);

        info!(
            "Node ready: {} sensors ({} active), {:?} IDs",
            runtimes.len(),
            runtimes.iter().filter(|s| s.spec().is_active()).count(),
            contract.kind
        );

        Ok(Node {
            transport,
            sensors: runtimes,
            matcher,
            power,
            scheduler,
            hooks,
            clock,
            waiter,
            config,
            handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeState;
    use crate::sensor::{SensorDriver, SensorError, SensorHeader};
    use crate::time::{ManualClock, NoopWait};
    use canode_can::{MockTransport, TransportCall};
    use canode_protocol::{CommandRule, IdKind, NodeFrame, ProtocolError};
    use std::sync::Mutex;

    struct Flaky {
        fail_begin: bool,
    }

    impl SensorDriver for Flaky {
        fn begin(&mut self, _header: &SensorHeader) -> Result<(), SensorError> {
            if self.fail_begin {
                Err(SensorError::NotReady)
            } else {
                Ok(())
            }
        }

        fn sample(
            &mut self,
            _header: &SensorHeader,
            frame: &mut NodeFrame,
        ) -> Result<(), SensorError> {
            frame.set_payload(&[0xEE])?;
            Ok(())
        }
    }

    #[test]
    fn test_build_runs_setup_in_order() {
        let transport = MockTransport::new();
        let bus = transport.handle();
        let log = Arc::new(Mutex::new(Vec::new()));
        let pre = Arc::clone(&log);
        let probe = bus.clone();

        let node = NodeBuilder::new(transport)
            .on_pre_setup(move || {
                // pre-setup 在收发器初始化之前执行
                pre.lock().unwrap().push(probe.calls().len());
            })
            .clock(ManualClock::new(0))
            .low_power_wait(NoopWait)
            .build()
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec![0]);
        assert_eq!(bus.calls(), vec![TransportCall::Begin]);
        assert_eq!(node.state(), NodeState::Awake);
        assert_eq!(node.contract(), &ControlContract::default());
    }

    #[test]
    fn test_transport_init_failure_is_fatal() {
        let transport = MockTransport::new();
        transport.handle().set_fail_begin(true);

        let result = NodeBuilder::new(transport).low_power_wait(NoopWait).build();
        assert!(matches!(result, Err(NodeError::TransportInit(_))));
    }

    #[test]
    fn test_invalid_contract_rejected_before_setup() {
        let transport = MockTransport::new();
        let bus = transport.handle();
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);

        let result = NodeBuilder::new(transport)
            .contract(ControlContract {
                kind: IdKind::Standard,
                command_byte_index: 0,
                sleep: CommandRule::new(0x1000, 0),
                wake: None,
            })
            .on_pre_setup(move || *flag.lock().unwrap() = true)
            .build();

        assert!(matches!(
            result,
            Err(NodeError::Contract(ProtocolError::InvalidCanId { id: 0x1000, .. }))
        ));
        assert!(!*ran.lock().unwrap());
        assert!(bus.calls().is_empty());
    }

    #[test]
    fn test_sensor_id_must_fit_kind() {
        let result = NodeBuilder::new(MockTransport::new())
            .contract(ControlContract {
                kind: IdKind::Standard,
                wake: None,
                ..ControlContract::default()
            })
            .sensor(SensorSpec::new(
                SensorHeader::new("wide", 0x1_0000, 100),
                Flaky { fail_begin: false },
            ))
            .build();

        match result {
            Err(NodeError::InvalidSensorId { name, can_id, .. }) => {
                assert_eq!(name, "wide");
                assert_eq!(can_id, 0x1_0000);
            },
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected InvalidSensorId"),
        }
    }

    #[test]
    fn test_sensor_begin_failure_keeps_sensor_scheduled() {
        let node = NodeBuilder::new(MockTransport::new())
            .sensor(SensorSpec::new(
                SensorHeader::new("flaky", 0x10, 100),
                Flaky { fail_begin: true },
            ))
            .sensor(SensorSpec::new(
                SensorHeader::new("ok", 0x11, 100),
                Flaky { fail_begin: false },
            ))
            .clock(ManualClock::new(1_000))
            .low_power_wait(NoopWait)
            .build()
            .unwrap();

        assert_eq!(node.metrics().begin_failures, 1);
        assert_eq!(node.sensors()[0].next_due(), Some(1_000));
        assert_eq!(node.sensors()[1].next_due(), Some(1_050));
    }
}
