//! 休眠/唤醒控制约定
//!
//! 描述如何从总线帧中识别休眠指令和唤醒指令。约定在启动时由板级配置给出，
//! 运行期间不再修改。

use crate::{IdKind, MAX_PAYLOAD, NodeFrame, ProtocolError};

/// 单条控制指令的匹配规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandRule {
    /// 指令帧 CAN ID
    pub id: u32,
    /// 载荷指定位置上的期望字节
    pub byte: u8,
}

impl CommandRule {
    pub const fn new(id: u32, byte: u8) -> Self {
        Self { id, byte }
    }
}

/// 控制指令约定
///
/// 一帧匹配某条指令的条件：
/// 1. 标识符格式与 `kind` 一致
/// 2. ID 等于指令 ID
/// 3. `command_byte_index` 小于帧的有效长度
/// 4. 该位置上的字节等于指令期望值
///
/// 唤醒规则是可选的：部分部署只依赖收发器的硬件唤醒检测。
///
/// # 示例
///
/// ```rust
/// use canode_protocol::{CommandRule, ControlContract, IdKind};
///
/// let contract = ControlContract {
///     kind: IdKind::Extended,
///     command_byte_index: 0,
///     sleep: CommandRule::new(0x100, 0x00),
///     wake: Some(CommandRule::new(0x100, 0x01)),
/// };
/// assert!(contract.validate().is_ok());
///
/// let frame = contract.sleep_frame();
/// assert_eq!(frame.id, 0x100);
/// assert_eq!(frame.data_slice(), &[0x00]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlContract {
    /// 指令帧的标识符格式（整个节点统一）
    pub kind: IdKind,
    /// 载荷中承载指令字节的位置
    pub command_byte_index: u8,
    /// 休眠指令
    pub sleep: CommandRule,
    /// 唤醒指令（可选）
    pub wake: Option<CommandRule>,
}

impl Default for ControlContract {
    /// 与现有系统级 CAN 控制约定一致：扩展帧，ID 0，字节 0 休眠 / 字节 1 唤醒
    fn default() -> Self {
        Self {
            kind: IdKind::Extended,
            command_byte_index: 0,
            sleep: CommandRule::new(0x0, 0x0),
            wake: Some(CommandRule::new(0x0, 0x1)),
        }
    }
}

impl ControlContract {
    /// 检查约定是否自洽
    ///
    /// # Errors
    /// - `ProtocolError::InvalidCanId`: 指令 ID 超出标识符格式范围
    /// - `ProtocolError::CommandIndexOutOfRange`: 字节位置超出最大载荷
    /// - `ProtocolError::AmbiguousCommands`: 休眠与唤醒规则完全相同
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.command_byte_index as usize >= MAX_PAYLOAD {
            return Err(ProtocolError::CommandIndexOutOfRange {
                index: self.command_byte_index as usize,
                max: MAX_PAYLOAD,
            });
        }

        for rule in std::iter::once(&self.sleep).chain(self.wake.as_ref()) {
            if !self.kind.accepts(rule.id) {
                return Err(ProtocolError::InvalidCanId {
                    id: rule.id,
                    kind: self.kind,
                });
            }
        }

        if self.wake == Some(self.sleep) {
            return Err(ProtocolError::AmbiguousCommands {
                id: self.sleep.id,
                byte: self.sleep.byte,
            });
        }

        Ok(())
    }

    /// 构造一帧满足休眠规则的指令帧
    pub fn sleep_frame(&self) -> NodeFrame {
        self.command_frame(self.sleep)
    }

    /// 构造一帧满足唤醒规则的指令帧（约定中无唤醒规则时返回 `None`）
    pub fn wake_frame(&self) -> Option<NodeFrame> {
        self.wake.map(|rule| self.command_frame(rule))
    }

    /// 载荷长度恰好覆盖指令字节，其余位置为 0
    fn command_frame(&self, rule: CommandRule) -> NodeFrame {
        let index = (self.command_byte_index as usize).min(MAX_PAYLOAD - 1);
        let mut frame = NodeFrame::empty(rule.id, self.kind);
        frame.data[index] = rule.byte;
        frame.len = (index + 1) as u8;
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_contract_is_valid() {
        let contract = ControlContract::default();
        assert_eq!(contract.kind, IdKind::Extended);
        assert!(contract.validate().is_ok());
    }

    #[test]
    fn test_validate_index_out_of_range() {
        let contract = ControlContract {
            command_byte_index: MAX_PAYLOAD as u8,
            ..ControlContract::default()
        };
        assert!(matches!(
            contract.validate(),
            Err(ProtocolError::CommandIndexOutOfRange { index: 64, .. })
        ));
    }

    #[test]
    fn test_validate_standard_id_range() {
        let contract = ControlContract {
            kind: IdKind::Standard,
            sleep: CommandRule::new(0x800, 0),
            wake: None,
            ..ControlContract::default()
        };
        assert!(matches!(
            contract.validate(),
            Err(ProtocolError::InvalidCanId { id: 0x800, .. })
        ));
    }

    #[test]
    fn test_validate_ambiguous_rules() {
        let contract = ControlContract {
            sleep: CommandRule::new(0x10, 0x5),
            wake: Some(CommandRule::new(0x10, 0x5)),
            ..ControlContract::default()
        };
        assert!(matches!(
            contract.validate(),
            Err(ProtocolError::AmbiguousCommands { id: 0x10, byte: 0x5 })
        ));
    }

    #[test]
    fn test_command_frames() {
        let contract = ControlContract {
            kind: IdKind::Standard,
            command_byte_index: 2,
            sleep: CommandRule::new(0x20, 0xA0),
            wake: Some(CommandRule::new(0x21, 0xA1)),
        };

        let sleep = contract.sleep_frame();
        assert_eq!(sleep.id, 0x20);
        assert_eq!(sleep.kind, IdKind::Standard);
        assert_eq!(sleep.data_slice(), &[0, 0, 0xA0]);

        let wake = contract.wake_frame().unwrap();
        assert_eq!(wake.id, 0x21);
        assert_eq!(wake.data_slice(), &[0, 0, 0xA1]);

        let no_wake = ControlContract {
            wake: None,
            ..contract
        };
        assert!(no_wake.wake_frame().is_none());
    }
}
