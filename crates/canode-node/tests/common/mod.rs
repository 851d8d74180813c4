//! 集成测试共享设施：记录型传感器驱动 + Mock 总线 + 手动时钟

#![allow(dead_code)]

use canode_can::{MockBusHandle, MockTransport};
use canode_node::{
    LifecycleHooks, ManualClock, Node, NodeBuilder, NodeConfig, NoopWait, SensorDriver,
    SensorError, SensorHeader, SensorSpec,
};
use canode_protocol::{ControlContract, NodeFrame};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 驱动与钩子调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Begin(String),
    Sample(String),
    Suspend(String),
    Resume(String),
    PreSetup,
    BeforeSleep,
    AfterWake,
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// 记录所有调用的传感器驱动，采样结果为单调递增的计数
pub struct RecordingDriver {
    log: EventLog,
    counter: u16,
    fail_sample: bool,
}

impl RecordingDriver {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: Arc::clone(log),
            counter: 0,
            fail_sample: false,
        }
    }

    pub fn failing(log: &EventLog) -> Self {
        Self {
            fail_sample: true,
            ..Self::new(log)
        }
    }

    fn push(&self, event: Event) {
        self.log.lock().unwrap().push(event);
    }
}

impl SensorDriver for RecordingDriver {
    fn begin(&mut self, header: &SensorHeader) -> Result<(), SensorError> {
        self.push(Event::Begin(header.name.clone()));
        Ok(())
    }

    fn sample(&mut self, header: &SensorHeader, frame: &mut NodeFrame) -> Result<(), SensorError> {
        self.push(Event::Sample(header.name.clone()));
        if self.fail_sample {
            return Err(SensorError::NotReady);
        }
        self.counter += 1;
        frame.set_payload(&self.counter.to_be_bytes())?;
        Ok(())
    }

    fn suspend(&mut self, header: &SensorHeader) {
        self.push(Event::Suspend(header.name.clone()));
    }

    fn resume(&mut self, header: &SensorHeader) {
        self.push(Event::Resume(header.name.clone()));
    }
}

/// 完整节点 + 观察点
pub struct TestNode {
    pub node: Node<MockTransport>,
    pub bus: MockBusHandle,
    pub clock: ManualClock,
    pub log: EventLog,
    pub contract: ControlContract,
}

impl TestNode {
    /// `sensors`: (名称, CAN ID, 周期)
    pub fn new(sensors: &[(&str, u32, u32)]) -> Self {
        Self::with_contract(ControlContract::default(), sensors)
    }

    pub fn with_contract(contract: ControlContract, sensors: &[(&str, u32, u32)]) -> Self {
        let log: EventLog = Arc::default();
        let specs: Vec<SensorSpec> = sensors
            .iter()
            .map(|&(name, id, interval)| {
                SensorSpec::new(SensorHeader::new(name, id, interval), RecordingDriver::new(&log))
            })
            .collect();
        Self::build(contract, specs, log)
    }

    pub fn build(contract: ControlContract, specs: Vec<SensorSpec>, log: EventLog) -> Self {
        let config = NodeConfig {
            tick_period: Duration::ZERO,
            ..NodeConfig::default()
        };
        Self::build_with_config(contract, specs, log, config)
    }

    pub fn build_with_config(
        contract: ControlContract,
        specs: Vec<SensorSpec>,
        log: EventLog,
        config: NodeConfig,
    ) -> Self {
        let transport = MockTransport::new();
        let bus = transport.handle();
        let clock = ManualClock::new(0);

        let hooks = {
            let pre = Arc::clone(&log);
            let before = Arc::clone(&log);
            let after = Arc::clone(&log);
            LifecycleHooks::new()
                .with_pre_setup(move || pre.lock().unwrap().push(Event::PreSetup))
                .with_before_sleep(move || before.lock().unwrap().push(Event::BeforeSleep))
                .with_after_wake(move || after.lock().unwrap().push(Event::AfterWake))
        };

        let node = NodeBuilder::new(transport)
            .contract(contract)
            .sensors(specs)
            .hooks(hooks)
            .clock(clock.clone())
            .low_power_wait(NoopWait)
            .config(config)
            .build()
            .unwrap();

        Self {
            node,
            bus,
            clock,
            log,
            contract,
        }
    }

    /// 取出并清空调用记录
    pub fn take_log(&self) -> Vec<Event> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    /// 已发送帧的 ID（取出并清空）
    pub fn take_sent_ids(&self) -> Vec<u32> {
        self.bus.take_sent().iter().map(|f| f.id).collect()
    }

    pub fn send_sleep_command(&self) {
        self.bus.inject(self.contract.sleep_frame());
    }

    pub fn send_wake_command(&self) {
        if let Some(frame) = self.contract.wake_frame() {
            self.bus.inject(frame);
        }
    }
}
