//! # canode CAN Transport Layer
//!
//! 总线传输抽象层：节点运行时只通过 [`BusTransport`] 使用收发器，
//! 具体后端（SocketCAN、Mock）可插拔替换。
//!
//! ## 后端
//!
//! - `socketcan`（Linux）：基于内核 SocketCAN 子系统
//! - `mock`（feature `mock`）：内存实现，用于测试，支持跨线程注入帧和唤醒边沿

use std::sync::Arc;
use thiserror::Error;

// 重新导出协议层帧类型
pub use canode_protocol::{IdKind, NodeFrame};

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socketcan::SocketCanTransport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBusHandle, MockTransport, TransportCall};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("No frame pending")]
    Empty,
    #[error("Bus off")]
    BusOff,
    #[error("Device not started")]
    NotStarted,
    #[error("Transport is in low-power mode")]
    LowPower,
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    NotFound,
    InterfaceDown,
    UnsupportedConfig,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// 收发器工作模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// 正常收发
    #[default]
    Normal,
    /// 低功耗（休眠），仅保留唤醒检测
    LowPower,
}

/// 硬件唤醒检测回调
///
/// 收发器在低功耗模式下检测到唤醒边沿时调用，调用方可能处于中断上下文。
///
/// # 要求
///
/// - **非阻塞**：禁止 Mutex、I/O、分配
/// - 只允许写入原子标志
pub trait WakeListener: Send + Sync {
    fn on_wake_detected(&self);
}

/// 节点运行时消费的总线传输能力
///
/// 接收路径是"中断 + 软件队列"模型：
/// - `service_interrupt()` 把硬件接收机制中的帧搬入驱动内部队列
///   （在 MCU 上由中断服务程序调用，在主机后端上由节点循环调用）
/// - `frames_available()` / `receive()` 非阻塞地取出队列中的帧
///
/// 进入低功耗的推荐顺序（避免唤醒边沿在中断使能之前到达）：
/// `clear_wake_flag()` → `arm_wake_interrupt()` → `set_standby(true)` → `enter_low_power_mode()`
pub trait BusTransport {
    /// 初始化收发器
    ///
    /// # Errors
    /// 初始化失败对节点是致命的，节点不得在未配置的总线上运行。
    fn begin(&mut self) -> Result<(), CanError>;

    /// 发送一帧（Fire-and-Forget，不重试）
    fn send(&mut self, frame: &NodeFrame) -> Result<(), CanError>;

    /// 非阻塞接收
    ///
    /// # Errors
    /// - `CanError::Empty`: 队列中没有帧
    fn receive(&mut self) -> Result<NodeFrame, CanError>;

    /// 队列中是否有待取出的帧
    fn frames_available(&self) -> bool;

    /// 服务接收中断（搬运硬件接收 FIFO）
    fn service_interrupt(&mut self);

    /// 请求收发器进入低功耗（休眠）模式
    fn enter_low_power_mode(&mut self) -> Result<(), CanError>;

    /// 请求收发器进入正常工作模式
    fn enter_normal_mode(&mut self) -> Result<(), CanError>;

    /// 使能唤醒中断
    fn arm_wake_interrupt(&mut self) -> Result<(), CanError>;

    /// 清除硬件唤醒检测标志
    fn clear_wake_flag(&mut self);

    /// 读取硬件唤醒检测标志
    fn wake_detected(&self) -> bool;

    /// 控制收发器 STBY 线（`true` 表示拉起待机）
    fn set_standby(&mut self, asserted: bool);

    /// 注册硬件唤醒检测回调（替换之前注册的回调）
    fn set_wake_listener(&mut self, listener: Arc<dyn WakeListener>);

    /// 非阻塞接收，无帧时返回 `Ok(None)`
    fn try_receive(&mut self) -> Result<Option<NodeFrame>, CanError> {
        if !self.frames_available() {
            return Ok(None);
        }
        match self.receive() {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Empty) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
