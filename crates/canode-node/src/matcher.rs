//! 休眠/唤醒指令匹配
//!
//! 检查每一帧入站帧是否为控制约定中的休眠或唤醒指令，
//! 命中时只写入 [`PendingRequests`] 标志，真正的状态切换留给节点循环。
//!
//! 匹配函数不阻塞、不分配，可以直接在接收中断中调用。

use crate::requests::PendingRequests;
use canode_can::WakeListener;
use canode_protocol::{CommandRule, ControlContract, NodeFrame};
use std::sync::Arc;
use tracing::trace;

/// 识别出的控制指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Sleep,
    Wake,
}

/// 帧是否满足某条指令规则
///
/// 标识符格式、ID 都必须一致，且指令字节位置必须落在帧的有效长度内。
pub fn matches_command(frame: &NodeFrame, contract: &ControlContract, rule: &CommandRule) -> bool {
    frame.kind == contract.kind
        && frame.id == rule.id
        && frame.byte(contract.command_byte_index as usize) == Some(rule.byte)
}

/// 帧是否为休眠指令
pub fn matches_sleep(frame: &NodeFrame, contract: &ControlContract) -> bool {
    matches_command(frame, contract, &contract.sleep)
}

/// 帧是否为唤醒指令（约定中无唤醒规则时总为 `false`）
pub fn matches_wake(frame: &NodeFrame, contract: &ControlContract) -> bool {
    contract
        .wake
        .as_ref()
        .is_some_and(|rule| matches_command(frame, contract, rule))
}

/// 指令匹配器
///
/// 同时作为收发器的 [`WakeListener`]：硬件唤醒检测与唤醒指令帧效果相同。
#[derive(Debug)]
pub struct CommandMatcher {
    contract: ControlContract,
    requests: Arc<PendingRequests>,
}

impl CommandMatcher {
    pub fn new(contract: ControlContract, requests: Arc<PendingRequests>) -> Self {
        Self { contract, requests }
    }

    pub fn contract(&self) -> &ControlContract {
        &self.contract
    }

    pub fn requests(&self) -> &Arc<PendingRequests> {
        &self.requests
    }

    /// 处理一帧入站帧
    ///
    /// 先检查休眠规则，再检查唤醒规则；两者都命中时唤醒后写入，唤醒生效。
    /// 未命中的帧被静默忽略，返回 `None`。
    pub fn handle_frame(&self, frame: &NodeFrame) -> Option<ControlCommand> {
        let mut command = None;

        if matches_sleep(frame, &self.contract) {
            self.requests.request_sleep();
            command = Some(ControlCommand::Sleep);
        }

        if matches_wake(frame, &self.contract) {
            self.requests.request_wake();
            command = Some(ControlCommand::Wake);
        }

        if let Some(command) = command {
            trace!("Control frame ID=0x{:X} matched {:?}", frame.id, command);
        }
        command
    }
}

impl WakeListener for CommandMatcher {
    fn on_wake_detected(&self) {
        self.requests.request_wake();
    }
}
