//! # canode Node Runtime
//!
//! CAN 传感器节点的运行时核心：
//!
//! - **指令匹配**（[`CommandMatcher`]）：识别总线上的休眠/唤醒指令帧
//! - **电源状态机**（[`PowerStateMachine`]）：在 Awake / Sleeping 之间切换
//! - **错峰轮询**（[`PollScheduler`]）：按周期采样传感器并发送数据帧
//! - **节点循环**（[`Node`]）：以固定顺序驱动以上组件
//!
//! 中断上下文（接收中断、硬件唤醒检测）只写 [`PendingRequests`] 中的两个原子标志，
//! 其他所有状态都只在节点循环线程上修改。
//!
//! ## 使用示例
//!
//! ```rust
//! use canode_can::MockTransport;
//! use canode_node::{ManualClock, NodeBuilder, NodeState, NoopWait, TickOutcome};
//! use canode_protocol::ControlContract;
//!
//! let transport = MockTransport::new();
//! let bus = transport.handle();
//! let clock = ManualClock::new(0);
//!
//! let mut node = NodeBuilder::new(transport)
//!     .clock(clock.clone())
//!     .low_power_wait(NoopWait)
//!     .build()
//!     .unwrap();
//!
//! bus.inject(ControlContract::default().sleep_frame());
//! node.tick();
//! assert_eq!(node.state(), NodeState::Sleeping);
//! assert_eq!(node.tick(), TickOutcome::Slept);
//! ```

pub mod builder;
pub mod error;
pub mod hooks;
pub mod matcher;
pub mod metrics;
pub mod node;
pub mod power;
pub mod requests;
pub mod scheduler;
pub mod sensor;
pub mod state;
pub mod time;

pub use builder::NodeBuilder;
pub use error::NodeError;
pub use hooks::{Hook, LifecycleHooks, LifecyclePoint};
pub use matcher::{CommandMatcher, ControlCommand, matches_command, matches_sleep, matches_wake};
pub use metrics::{MetricsSnapshot, NodeMetrics};
pub use node::{Node, NodeConfig, NodeHandle, TickOutcome};
pub use power::{PowerContext, PowerStateMachine};
pub use requests::PendingRequests;
pub use scheduler::{PollReport, PollScheduler, SensorRuntime, next_due_after_fire, stagger_offset};
pub use sensor::{SensorDriver, SensorError, SensorHeader, SensorSpec};
pub use state::{AtomicNodeState, NodeState};
pub use time::{Clock, DelayWait, LowPowerWait, ManualClock, MonotonicClock, NoopWait};
