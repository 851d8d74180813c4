//! 传感器描述与驱动接口

use canode_protocol::{NodeFrame, ProtocolError};
use std::fmt;
use thiserror::Error;

/// 传感器驱动错误
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sensor not ready")]
    NotReady,

    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    #[error("Payload error: {0}")]
    Payload(#[from] ProtocolError),

    #[error("Driver error: {0}")]
    Driver(String),
}

/// 传感器静态描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorHeader {
    /// 日志中使用的名称
    pub name: String,
    /// 数据帧 CAN ID
    pub can_id: u32,
    /// 轮询周期（毫秒），0 表示禁用
    pub poll_interval_ms: u32,
}

impl SensorHeader {
    pub fn new(name: impl Into<String>, can_id: u32, poll_interval_ms: u32) -> Self {
        Self {
            name: name.into(),
            can_id,
            poll_interval_ms,
        }
    }

    /// 是否参与轮询
    pub fn is_active(&self) -> bool {
        self.poll_interval_ms > 0
    }
}

/// 传感器驱动
///
/// 驱动在节点循环线程上被调用，不需要 `Sync`。
/// `sample()` 收到的帧已经填好 ID 和标识符格式，载荷为空，由驱动写入。
pub trait SensorDriver: Send {
    /// 初始化硬件
    ///
    /// 失败只会被记录，传感器仍保持调度（后续采样可能恢复）。
    fn begin(&mut self, header: &SensorHeader) -> Result<(), SensorError>;

    /// 采样并填充帧载荷
    ///
    /// 返回错误时该帧被丢弃，不发送。
    fn sample(&mut self, header: &SensorHeader, frame: &mut NodeFrame) -> Result<(), SensorError>;

    /// 节点进入休眠前调用（尽力而为，不报告错误）
    fn suspend(&mut self, header: &SensorHeader) {
        let _ = header;
    }

    /// 节点唤醒后调用
    fn resume(&mut self, header: &SensorHeader) {
        let _ = header;
    }
}

/// 传感器配置项：描述 + 驱动
///
/// 启动时提供一次，描述部分此后不再修改。
pub struct SensorSpec {
    header: SensorHeader,
    driver: Box<dyn SensorDriver>,
}

impl SensorSpec {
    pub fn new(header: SensorHeader, driver: impl SensorDriver + 'static) -> Self {
        Self::from_boxed(header, Box::new(driver))
    }

    pub fn from_boxed(header: SensorHeader, driver: Box<dyn SensorDriver>) -> Self {
        Self { header, driver }
    }

    pub fn header(&self) -> &SensorHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn can_id(&self) -> u32 {
        self.header.can_id
    }

    pub fn poll_interval_ms(&self) -> u32 {
        self.header.poll_interval_ms
    }

    pub fn is_active(&self) -> bool {
        self.header.is_active()
    }

    pub(crate) fn begin(&mut self) -> Result<(), SensorError> {
        self.driver.begin(&self.header)
    }

    pub(crate) fn sample(&mut self, frame: &mut NodeFrame) -> Result<(), SensorError> {
        self.driver.sample(&self.header, frame)
    }

    pub(crate) fn suspend(&mut self) {
        self.driver.suspend(&self.header);
    }

    pub(crate) fn resume(&mut self) {
        self.driver.resume(&self.header);
    }
}

impl fmt::Debug for SensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorSpec")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}
