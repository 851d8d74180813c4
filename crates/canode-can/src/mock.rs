//! Mock 传输后端
//!
//! 用于测试的内存收发器：
//! - `MockBusHandle::inject()` 可以在任意线程注入入站帧（模拟总线上的其他节点）
//! - `MockBusHandle::raise_wake_detect()` 模拟收发器的硬件唤醒边沿，
//!   在调用线程上直接触发已注册的 [`WakeListener`]（即"中断上下文"）
//! - 所有控制面调用按顺序记录为 [`TransportCall`]，用于断言休眠/唤醒时序

use crate::{BusTransport, CanDeviceError, CanDeviceErrorKind, CanError, TransportMode, WakeListener};
use canode_protocol::NodeFrame;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// 记录的控制面调用
///
/// `send` 与 `service_interrupt` 不记录在此（前者见 `sent_frames()`），
/// 以便测试只关注状态切换时序。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCall {
    Begin,
    EnterLowPowerMode,
    EnterNormalMode,
    ArmWakeInterrupt,
    ClearWakeFlag,
    SetStandby(bool),
}

#[derive(Default)]
struct MockShared {
    calls: Vec<TransportCall>,
    sent: Vec<NodeFrame>,
    mode: TransportMode,
    started: bool,
    standby: bool,
    wake_armed: bool,
    wake_flag: bool,
    fail_begin: bool,
    fail_send: bool,
    listener: Option<Arc<dyn WakeListener>>,
}

fn lock(shared: &Mutex<MockShared>) -> MutexGuard<'_, MockShared> {
    // 测试线程 panic 后仍允许读取记录
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 模拟收发器
pub struct MockTransport {
    shared: Arc<Mutex<MockShared>>,
    /// 模拟硬件接收 FIFO（跨线程注入）
    hw_rx: Receiver<NodeFrame>,
    hw_tx: Sender<NodeFrame>,
    /// 驱动软件队列（由 `service_interrupt` 填充）
    queue: VecDeque<NodeFrame>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (hw_tx, hw_rx) = unbounded();
        Self {
            shared: Arc::new(Mutex::new(MockShared::default())),
            hw_rx,
            hw_tx,
            queue: VecDeque::new(),
        }
    }

    /// 获取总线句柄（可克隆，可跨线程）
    pub fn handle(&self) -> MockBusHandle {
        MockBusHandle {
            shared: Arc::clone(&self.shared),
            hw_tx: self.hw_tx.clone(),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BusTransport for MockTransport {
    fn begin(&mut self) -> Result<(), CanError> {
        let mut shared = lock(&self.shared);
        shared.calls.push(TransportCall::Begin);
        if shared.fail_begin {
            return Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::NotFound,
                "mock transport configured to fail begin",
            )));
        }
        shared.started = true;
        shared.mode = TransportMode::Normal;
        Ok(())
    }

    fn send(&mut self, frame: &NodeFrame) -> Result<(), CanError> {
        let mut shared = lock(&self.shared);
        if !shared.started {
            return Err(CanError::NotStarted);
        }
        if shared.mode == TransportMode::LowPower {
            return Err(CanError::LowPower);
        }
        if shared.fail_send {
            return Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::Backend,
                "mock transport configured to fail send",
            )));
        }
        shared.sent.push(*frame);
        trace!("Mock sent frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    fn receive(&mut self) -> Result<NodeFrame, CanError> {
        self.queue.pop_front().ok_or(CanError::Empty)
    }

    fn frames_available(&self) -> bool {
        !self.queue.is_empty()
    }

    fn service_interrupt(&mut self) {
        while let Ok(frame) = self.hw_rx.try_recv() {
            self.queue.push_back(frame);
        }
    }

    fn enter_low_power_mode(&mut self) -> Result<(), CanError> {
        let mut shared = lock(&self.shared);
        shared.calls.push(TransportCall::EnterLowPowerMode);
        shared.mode = TransportMode::LowPower;
        Ok(())
    }

    fn enter_normal_mode(&mut self) -> Result<(), CanError> {
        let mut shared = lock(&self.shared);
        shared.calls.push(TransportCall::EnterNormalMode);
        shared.mode = TransportMode::Normal;
        shared.wake_armed = false;
        Ok(())
    }

    fn arm_wake_interrupt(&mut self) -> Result<(), CanError> {
        let mut shared = lock(&self.shared);
        shared.calls.push(TransportCall::ArmWakeInterrupt);
        shared.wake_armed = true;
        Ok(())
    }

    fn clear_wake_flag(&mut self) {
        let mut shared = lock(&self.shared);
        shared.calls.push(TransportCall::ClearWakeFlag);
        shared.wake_flag = false;
    }

    fn wake_detected(&self) -> bool {
        lock(&self.shared).wake_flag
    }

    fn set_standby(&mut self, asserted: bool) {
        let mut shared = lock(&self.shared);
        shared.calls.push(TransportCall::SetStandby(asserted));
        shared.standby = asserted;
    }

    fn set_wake_listener(&mut self, listener: Arc<dyn WakeListener>) {
        lock(&self.shared).listener = Some(listener);
    }
}

/// 模拟总线句柄
///
/// 代表总线另一侧（其他节点、收发器硬件）以及测试观察点。
#[derive(Clone)]
pub struct MockBusHandle {
    shared: Arc<Mutex<MockShared>>,
    hw_tx: Sender<NodeFrame>,
}

impl MockBusHandle {
    /// 向节点注入一帧入站帧
    ///
    /// 收发器处于低功耗且唤醒中断已使能时，总线活动同时触发唤醒检测。
    pub fn inject(&self, frame: NodeFrame) {
        // 接收端与 MockTransport 同生命周期，发送失败说明 transport 已被丢弃
        let _ = self.hw_tx.send(frame);
        let sleeping = lock(&self.shared).mode == TransportMode::LowPower;
        if sleeping {
            self.raise_wake_detect();
        }
    }

    /// 模拟硬件唤醒边沿
    ///
    /// 返回是否真正触发了唤醒（唤醒中断未使能时边沿被忽略）。
    pub fn raise_wake_detect(&self) -> bool {
        let listener = {
            let mut shared = lock(&self.shared);
            if !shared.wake_armed {
                return false;
            }
            shared.wake_flag = true;
            shared.listener.clone()
        };
        // 在锁外回调，模拟 ISR 直接写标志
        if let Some(listener) = listener {
            listener.on_wake_detected();
        }
        true
    }

    /// 已发送的帧（按发送顺序）
    pub fn sent_frames(&self) -> Vec<NodeFrame> {
        lock(&self.shared).sent.clone()
    }

    /// 取出并清空已发送的帧
    pub fn take_sent(&self) -> Vec<NodeFrame> {
        std::mem::take(&mut lock(&self.shared).sent)
    }

    /// 控制面调用记录
    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.shared).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.shared).calls.clear();
    }

    pub fn mode(&self) -> TransportMode {
        lock(&self.shared).mode
    }

    pub fn standby(&self) -> bool {
        lock(&self.shared).standby
    }

    pub fn is_wake_armed(&self) -> bool {
        lock(&self.shared).wake_armed
    }

    pub fn wake_flag(&self) -> bool {
        lock(&self.shared).wake_flag
    }

    /// 令下一次 `begin()` 失败
    pub fn set_fail_begin(&self, fail: bool) {
        lock(&self.shared).fail_begin = fail;
    }

    /// 令后续 `send()` 失败
    pub fn set_fail_send(&self, fail: bool) {
        lock(&self.shared).fail_send = fail;
    }
}
