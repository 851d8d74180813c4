//! # canode Protocol
//!
//! 传感器节点 CAN 总线帧与控制协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `control`: 休眠/唤醒控制指令的匹配约定（`ControlContract`）
//!
//! ## 帧格式
//!
//! 节点使用 CAN FD 帧承载传感器数据，单帧载荷最长 64 字节。
//! 标识符可以是标准帧（11-bit）或扩展帧（29-bit），由板级配置统一指定。

pub mod control;

pub use control::{CommandRule, ControlContract};

use std::fmt;
use thiserror::Error;

/// 单帧最大载荷（CAN FD）
pub const MAX_PAYLOAD: usize = 64;

/// 标准帧 ID 最大值（11-bit）
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// 扩展帧 ID 最大值（29-bit）
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// 标识符格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum IdKind {
    /// 标准帧（11-bit ID）
    #[default]
    Standard,
    /// 扩展帧（29-bit ID）
    Extended,
}

impl IdKind {
    /// 从 "是否扩展帧" 标志转换
    pub fn from_extended(is_extended: bool) -> Self {
        if is_extended {
            Self::Extended
        } else {
            Self::Standard
        }
    }

    /// 是否为扩展帧
    pub fn is_extended(self) -> bool {
        self == Self::Extended
    }

    /// 该格式允许的最大 ID
    pub fn max_id(self) -> u32 {
        match self {
            Self::Standard => MAX_STANDARD_ID,
            Self::Extended => MAX_EXTENDED_ID,
        }
    }

    /// ID 是否落在该格式的取值范围内
    pub fn accepts(self, id: u32) -> bool {
        id <= self.max_id()
    }
}

/// 节点总线帧
///
/// 协议层与传输层之间的统一帧抽象：
/// - 传感器采样时由调度器构造空帧，驱动填充载荷
/// - 传输层接收到的帧转换为此类型后交给指令匹配器
///
/// # 设计特性
///
/// - **Copy trait**：固定 64 字节缓冲区，无堆分配，可在中断上下文中安全使用
/// - **不持有**：帧只在当次处理中使用，不被保留
///
/// # 示例
///
/// ```rust
/// use canode_protocol::{IdKind, NodeFrame};
///
/// let frame = NodeFrame::new_extended(0x300, &[0x01, 0x02]);
/// assert_eq!(frame.kind, IdKind::Extended);
/// assert_eq!(frame.data_slice(), &[0x01, 0x02]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFrame {
    /// CAN ID（标准帧或扩展帧）
    pub id: u32,

    /// 标识符格式
    pub kind: IdKind,

    /// 有效载荷长度 (0-64)
    pub len: u8,

    /// 载荷缓冲区，未使用部分为 0
    pub data: [u8; MAX_PAYLOAD],
}

impl NodeFrame {
    /// 创建标准帧（超出 64 字节的数据被截断）
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, IdKind::Standard, data)
    }

    /// 创建扩展帧（超出 64 字节的数据被截断）
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, IdKind::Extended, data)
    }

    /// 创建空载荷帧
    ///
    /// 调度器在每次采样前用它构造新帧，由传感器驱动填充载荷。
    pub const fn empty(id: u32, kind: IdKind) -> Self {
        Self {
            id,
            kind,
            len: 0,
            data: [0u8; MAX_PAYLOAD],
        }
    }

    /// 通用构造器
    pub fn new(id: u32, kind: IdKind, data: &[u8]) -> Self {
        let mut frame = Self::empty(id, kind);
        let len = data.len().min(MAX_PAYLOAD);
        frame.data[..len].copy_from_slice(&data[..len]);
        frame.len = len as u8;
        frame
    }

    /// 替换载荷
    ///
    /// # Errors
    /// - `ProtocolError::PayloadTooLong`: 数据超过 [`MAX_PAYLOAD`]
    pub fn set_payload(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        if data.len() > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLong {
                len: data.len(),
                max: MAX_PAYLOAD,
            });
        }
        self.data = [0u8; MAX_PAYLOAD];
        self.data[..data.len()].copy_from_slice(data);
        self.len = data.len() as u8;
        Ok(())
    }

    /// 获取有效数据切片
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..(self.len as usize).min(MAX_PAYLOAD)]
    }

    /// 读取载荷中的单个字节，越过有效长度时返回 `None`
    pub fn byte(&self, index: usize) -> Option<u8> {
        self.data_slice().get(index).copied()
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 是否为扩展帧
    pub fn is_extended(&self) -> bool {
        self.kind.is_extended()
    }

    /// 检查 ID 与长度是否合法
    ///
    /// # Errors
    /// - `ProtocolError::InvalidCanId`: ID 超出标识符格式范围
    /// - `ProtocolError::PayloadTooLong`: `len` 超过 [`MAX_PAYLOAD`]
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if !self.kind.accepts(self.id) {
            return Err(ProtocolError::InvalidCanId {
                id: self.id,
                kind: self.kind,
            });
        }
        if self.len as usize > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLong {
                len: self.len as usize,
                max: MAX_PAYLOAD,
            });
        }
        Ok(())
    }
}

/// 调试输出格式：`ID=0x300 len=2 data=[01, A0]`
impl fmt::Display for NodeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID=0x{:X} len={} data={:02X?}",
            self.id,
            self.len,
            self.data_slice()
        )
    }
}

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Payload too long: {len} bytes (max {max})")]
    PayloadTooLong { len: usize, max: usize },

    #[error("Invalid CAN ID 0x{id:X} for {kind:?} frame")]
    InvalidCanId { id: u32, kind: IdKind },

    #[error("Command byte index {index} out of range (max payload {max})")]
    CommandIndexOutOfRange { index: usize, max: usize },

    #[error("Sleep and wake commands are indistinguishable (id 0x{id:X}, byte 0x{byte:02X})")]
    AmbiguousCommands { id: u32, byte: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_truncates_long_payload() {
        let data = [0xAAu8; 80];
        let frame = NodeFrame::new_extended(0x123, &data);
        assert_eq!(frame.len as usize, MAX_PAYLOAD);
        assert_eq!(frame.data_slice().len(), MAX_PAYLOAD);
    }

    #[test]
    fn test_empty_frame() {
        let frame = NodeFrame::empty(0x300, IdKind::Extended);
        assert_eq!(frame.len, 0);
        assert!(frame.data_slice().is_empty());
        assert_eq!(frame.byte(0), None);
    }

    #[test]
    fn test_set_payload() {
        let mut frame = NodeFrame::new_standard(0x10, &[9, 9, 9, 9]);
        frame.set_payload(&[1, 2]).unwrap();
        assert_eq!(frame.data_slice(), &[1, 2]);
        // 旧数据被清零
        assert_eq!(frame.data[2], 0);

        let err = frame.set_payload(&[0u8; MAX_PAYLOAD + 1]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PayloadTooLong {
                len: MAX_PAYLOAD + 1,
                max: MAX_PAYLOAD
            }
        );
        // 失败时保留原载荷
        assert_eq!(frame.data_slice(), &[1, 2]);
    }

    #[test]
    fn test_display_dumps_payload() {
        let frame = NodeFrame::new_standard(0x300, &[0x01, 0xA0]);
        assert_eq!(frame.to_string(), "ID=0x300 len=2 data=[01, A0]");

        let empty = NodeFrame::new_extended(0x1ABC, &[]);
        assert_eq!(empty.to_string(), "ID=0x1ABC len=0 data=[]");
    }

    #[test]
    fn test_byte_respects_len() {
        let frame = NodeFrame::new_standard(0x10, &[7, 8]);
        assert_eq!(frame.byte(0), Some(7));
        assert_eq!(frame.byte(1), Some(8));
        assert_eq!(frame.byte(2), None);
    }

    #[test]
    fn test_id_kind_ranges() {
        assert!(IdKind::Standard.accepts(0x7FF));
        assert!(!IdKind::Standard.accepts(0x800));
        assert!(IdKind::Extended.accepts(0x1FFF_FFFF));
        assert!(!IdKind::Extended.accepts(0x2000_0000));
        assert_eq!(IdKind::from_extended(true), IdKind::Extended);
        assert_eq!(IdKind::from_extended(false), IdKind::Standard);
    }

    #[test]
    fn test_validate() {
        let ok = NodeFrame::new(0x7FF, IdKind::Standard, &[1]);
        assert!(ok.validate().is_ok());

        let bad_id = NodeFrame::new(0x800, IdKind::Standard, &[1]);
        assert!(matches!(
            bad_id.validate(),
            Err(ProtocolError::InvalidCanId { id: 0x800, .. })
        ));
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidCanId {
            id: 0x800,
            kind: IdKind::Standard,
        };
        assert_eq!(format!("{}", err), "Invalid CAN ID 0x800 for Standard frame");
    }
}
