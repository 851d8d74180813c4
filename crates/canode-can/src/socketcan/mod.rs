//! SocketCAN 传输后端
//!
//! Linux 主机上的 [`BusTransport`] 实现，用于在开发板之外运行节点
//! （`vcan0` 仿真、USB-CAN 适配器等）。
//!
//! ## 与 MCU 收发器的差异
//!
//! - **无中断线**：`service_interrupt()` 由节点循环调用，用零超时 `poll` 搬运内核接收队列
//! - **无 STBY 引脚**：待机线与低功耗模式只记录为软件状态，内核接口保持 UP
//! - **唤醒检测**：低功耗模式下唤醒中断已使能时，任何入站帧都视为总线唤醒
//!   （与 MCP2517FD 等收发器的总线活动唤醒一致）
//! - **仅 CAN 2.0**：载荷超过 8 字节的帧在发送时被拒绝
//!
//! ## 依赖
//!
//! - `socketcan` crate (版本 3.5)
//! - CAN 接口必须已通过 `ip link` 配置并启动

use crate::{BusTransport, CanDeviceError, CanDeviceErrorKind, CanError, TransportMode, WakeListener};
use canode_protocol::{IdKind, NodeFrame};
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use socketcan::{
    BlockingCan, CanError as SocketCanError, CanErrorFrame, CanFrame, CanSocket, EmbeddedFrame,
    ExtendedId, Frame, Socket, StandardId,
};
use std::collections::VecDeque;
use std::convert::TryFrom;
use std::os::fd::BorrowedFd;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

mod interface_check;

pub use interface_check::check_interface_status;

/// CAN 2.0 单帧最大载荷
pub const CLASSIC_MAX_PAYLOAD: usize = 8;

/// 默认软件接收队列容量
pub const DEFAULT_RX_QUEUE_CAPACITY: usize = 64;

/// SocketCAN 收发器
///
/// # 示例
///
/// ```no_run
/// use canode_can::{BusTransport, NodeFrame, SocketCanTransport};
///
/// let mut transport = SocketCanTransport::new("vcan0");
/// transport.begin().unwrap();
/// transport.send(&NodeFrame::new_standard(0x300, &[0x01, 0x02])).unwrap();
/// ```
pub struct SocketCanTransport {
    /// 接口名称（如 "can0"）
    interface: String,
    /// 期望的波特率（仅用于校验日志，实际由 `ip link` 配置）
    bitrate: Option<u32>,
    /// `begin()` 之后才打开
    socket: Option<CanSocket>,
    /// 软件接收队列（模拟收发器 RX FIFO）
    rx_queue: VecDeque<NodeFrame>,
    rx_capacity: usize,
    mode: TransportMode,
    standby: bool,
    wake_armed: bool,
    wake_flag: bool,
    listener: Option<Arc<dyn WakeListener>>,
}

impl SocketCanTransport {
    /// 创建收发器（不打开 socket，见 [`BusTransport::begin`]）
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            bitrate: None,
            socket: None,
            rx_queue: VecDeque::with_capacity(DEFAULT_RX_QUEUE_CAPACITY),
            rx_capacity: DEFAULT_RX_QUEUE_CAPACITY,
            mode: TransportMode::Normal,
            standby: false,
            wake_armed: false,
            wake_flag: false,
            listener: None,
        }
    }

    /// 设置期望波特率
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// 设置软件接收队列容量（至少为 1）
    pub fn with_rx_capacity(mut self, capacity: usize) -> Self {
        self.rx_capacity = capacity.max(1);
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn is_started(&self) -> bool {
        self.socket.is_some()
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn standby(&self) -> bool {
        self.standby
    }

    /// 非阻塞读取一帧内核帧（无数据时返回 `Ok(None)`）
    fn poll_kernel_frame(&mut self) -> Result<Option<CanFrame>, CanError> {
        let socket = self.socket.as_ref().ok_or(CanError::NotStarted)?;
        let fd = socket.as_raw_fd();

        let pollfd = PollFd::new(unsafe { BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN);
        match poll(&mut [pollfd], PollTimeout::from(0u16)) {
            Ok(0) => return Ok(None),
            Ok(_) => {},
            Err(e) => {
                return Err(CanError::Io(std::io::Error::other(format!(
                    "poll failed: {}",
                    e
                ))));
            },
        }

        socket.read_frame().map(Some).map_err(CanError::Io)
    }

    /// 错误帧分类：总线关闭是需要上报的错误，其余记录后忽略
    fn handle_error_frame(&self, can_frame: CanFrame) -> Result<(), CanError> {
        match CanErrorFrame::try_from(can_frame) {
            Ok(error_frame) => {
                let socketcan_error = SocketCanError::from(error_frame);
                if let SocketCanError::BusOff = socketcan_error {
                    error!("CAN Bus Off error detected on '{}'", self.interface);
                    return Err(CanError::BusOff);
                }
                warn!("CAN Error Frame received: {}, ignoring", socketcan_error);
            },
            Err(_) => warn!("Received CAN error frame but failed to parse, ignoring"),
        }
        Ok(())
    }

    fn to_node_frame(can_frame: &CanFrame) -> NodeFrame {
        // raw_id() 含标志位：扩展帧取低 29 位，标准帧取低 11 位
        let (id, kind) = if can_frame.is_extended() {
            (can_frame.raw_id() & 0x1FFF_FFFF, IdKind::Extended)
        } else {
            (can_frame.raw_id() & 0x7FF, IdKind::Standard)
        };
        NodeFrame::new(id, kind, can_frame.data())
    }

    fn to_can_frame(frame: &NodeFrame) -> Result<CanFrame, CanError> {
        if frame.len as usize > CLASSIC_MAX_PAYLOAD {
            return Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::InvalidFrame,
                format!(
                    "Frame 0x{:X} carries {} bytes; SocketCAN backend supports at most {}",
                    frame.id, frame.len, CLASSIC_MAX_PAYLOAD
                ),
            )));
        }

        let payload = frame.data_slice();
        let can_frame = match frame.kind {
            IdKind::Extended => ExtendedId::new(frame.id).and_then(|id| CanFrame::new(id, payload)),
            IdKind::Standard => u16::try_from(frame.id)
                .ok()
                .and_then(StandardId::new)
                .and_then(|id| CanFrame::new(id, payload)),
        };

        can_frame.ok_or_else(|| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::InvalidFrame,
                format!("Failed to create {:?} frame with ID 0x{:X}", frame.kind, frame.id),
            ))
        })
    }

    fn push_rx(&mut self, frame: NodeFrame) {
        if self.rx_queue.len() >= self.rx_capacity {
            // 与硬件 FIFO 一致：溢出时丢弃最旧的帧
            self.rx_queue.pop_front();
            warn!(
                "RX queue overflow on '{}' (capacity {}), dropping oldest frame",
                self.interface, self.rx_capacity
            );
        }
        self.rx_queue.push_back(frame);
    }
}

impl BusTransport for SocketCanTransport {
    /// 检查接口状态并打开 socket
    ///
    /// # 错误
    /// - `CanError::Device`: 接口不存在 / 未启动 / 无法打开
    /// - `CanError::Io`: 系统调用失败
    fn begin(&mut self) -> Result<(), CanError> {
        if !check_interface_status(&self.interface)? {
            return Err(CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::InterfaceDown,
                format!(
                    "CAN interface '{}' exists but is not UP. Start it first:\n  sudo ip link set up {}",
                    self.interface, self.interface
                ),
            )));
        }

        let socket = CanSocket::open(&self.interface).map_err(|e| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::Backend,
                format!("Failed to open CAN interface '{}': {}", self.interface, e),
            ))
        })?;

        if let Some(bitrate) = self.bitrate {
            // 波特率由系统工具（ip link）配置，这里只记录期望值
            debug!(
                "SocketCAN interface '{}' expects {} bit/s (configured externally)",
                self.interface, bitrate
            );
        }

        self.socket = Some(socket);
        self.mode = TransportMode::Normal;
        info!("SocketCAN interface '{}' opened", self.interface);
        Ok(())
    }

    fn send(&mut self, frame: &NodeFrame) -> Result<(), CanError> {
        if self.mode == TransportMode::LowPower {
            return Err(CanError::LowPower);
        }
        let can_frame = Self::to_can_frame(frame)?;
        let socket = self.socket.as_mut().ok_or(CanError::NotStarted)?;

        socket.transmit(&can_frame).map_err(|e| {
            CanError::Io(std::io::Error::other(format!(
                "SocketCAN transmit error: {}",
                e
            )))
        })?;

        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    fn receive(&mut self) -> Result<NodeFrame, CanError> {
        self.rx_queue.pop_front().ok_or(CanError::Empty)
    }

    fn frames_available(&self) -> bool {
        !self.rx_queue.is_empty()
    }

    /// 搬运内核接收队列（单次最多 `rx_capacity` 帧）
    fn service_interrupt(&mut self) {
        if self.socket.is_none() {
            return;
        }

        let mut received_any = false;
        for _ in 0..self.rx_capacity {
            let can_frame = match self.poll_kernel_frame() {
                Ok(Some(can_frame)) => can_frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("CAN receive error on '{}': {}", self.interface, e);
                    break;
                },
            };

            if can_frame.is_error_frame() {
                if let Err(e) = self.handle_error_frame(can_frame) {
                    warn!("CAN bus error on '{}': {}", self.interface, e);
                }
                continue;
            }
            if can_frame.is_remote_frame() {
                trace!("Ignoring remote frame ID=0x{:X}", can_frame.raw_id());
                continue;
            }

            let frame = Self::to_node_frame(&can_frame);
            trace!("Received CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
            self.push_rx(frame);
            received_any = true;
        }

        let sleeping = self.mode == TransportMode::LowPower;
        if received_any && sleeping && self.wake_armed && !self.wake_flag {
            self.wake_flag = true;
            debug!("Bus activity on '{}' while in low-power mode", self.interface);
            if let Some(listener) = &self.listener {
                listener.on_wake_detected();
            }
        }
    }

    fn enter_low_power_mode(&mut self) -> Result<(), CanError> {
        if self.socket.is_none() {
            return Err(CanError::NotStarted);
        }
        self.mode = TransportMode::LowPower;
        debug!("SocketCAN interface '{}' entered low-power mode", self.interface);
        Ok(())
    }

    fn enter_normal_mode(&mut self) -> Result<(), CanError> {
        if self.socket.is_none() {
            return Err(CanError::NotStarted);
        }
        self.mode = TransportMode::Normal;
        self.wake_armed = false;
        debug!("SocketCAN interface '{}' entered normal mode", self.interface);
        Ok(())
    }

    fn arm_wake_interrupt(&mut self) -> Result<(), CanError> {
        if self.socket.is_none() {
            return Err(CanError::NotStarted);
        }
        self.wake_armed = true;
        Ok(())
    }

    fn clear_wake_flag(&mut self) {
        self.wake_flag = false;
    }

    fn wake_detected(&self) -> bool {
        self.wake_flag
    }

    fn set_standby(&mut self, asserted: bool) {
        // 主机适配器没有 STBY 引脚
        self.standby = asserted;
        trace!("SocketCAN '{}' standby line -> {}", self.interface, asserted);
    }

    fn set_wake_listener(&mut self, listener: Arc<dyn WakeListener>) {
        self.listener = Some(listener);
    }
}

impl Drop for SocketCanTransport {
    fn drop(&mut self) {
        if self.socket.is_some() {
            trace!("[Auto-Drop] SocketCAN interface '{}' closed", self.interface);
        }
    }
}
