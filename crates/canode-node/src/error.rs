//! 节点层错误类型定义

use canode_can::{CanError, IdKind};
use canode_protocol::ProtocolError;
use thiserror::Error;

/// 节点构建错误
///
/// 运行期间的故障（采样失败、发送失败、状态切换时的收发器错误）不会上抛，
/// 只记录日志和计数；这里只有启动阶段的致命错误。
#[derive(Error, Debug)]
pub enum NodeError {
    /// 收发器初始化失败，节点不得在未配置的总线上运行
    #[error("Transport initialization failed: {0}")]
    TransportInit(#[source] CanError),

    /// 控制约定不自洽
    #[error("Invalid control contract: {0}")]
    Contract(#[from] ProtocolError),

    /// 传感器的总线 ID 超出节点标识符格式的范围
    #[error("Sensor '{name}': CAN ID 0x{can_id:X} out of range for {kind:?} frames")]
    InvalidSensorId {
        name: String,
        can_id: u32,
        kind: IdKind,
    },
}
