//! 节点电源状态定义

use num_enum::{FromPrimitive, IntoPrimitive};
use std::sync::atomic::{AtomicU8, Ordering};

/// 节点电源状态
///
/// 任意时刻恰好处于其中之一，只能由电源状态机切换。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum NodeState {
    /// 正常工作：轮询传感器并发送数据帧（默认）
    #[default]
    Awake = 0,

    /// 休眠：收发器处于低功耗，仅等待唤醒
    Sleeping = 1,
}

impl NodeState {
    pub fn is_awake(self) -> bool {
        self == Self::Awake
    }

    pub fn is_sleeping(self) -> bool {
        self == Self::Sleeping
    }
}

/// 节点状态（原子版本，用于线程间发布）
///
/// 只有节点循环写入；其他线程通过 [`NodeHandle`](crate::NodeHandle) 读取。
#[derive(Debug, Default)]
pub struct AtomicNodeState {
    inner: AtomicU8,
}

impl AtomicNodeState {
    pub fn new(state: NodeState) -> Self {
        Self {
            inner: AtomicU8::new(state.into()),
        }
    }

    pub fn get(&self) -> NodeState {
        NodeState::from(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: NodeState) {
        self.inner.store(state.into(), Ordering::Release);
    }
}
