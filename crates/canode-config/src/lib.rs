//! # canode Board Configuration
//!
//! 板级配置文件（TOML）：收发器接线、控制约定、循环参数和有序的传感器表。
//! 配置在启动时加载并校验一次，运行期间不再修改。
//!
//! ```toml
//! [transport]
//! interface = "can0"
//!
//! [control]
//! extended_ids = true
//! sleep = { id = 0x0, byte = 0x00 }
//! wake = { id = 0x0, byte = 0x01 }
//!
//! [[sensors]]
//! name = "AnalogRaw0"
//! can_id = 0x300
//! poll_interval_ms = 10
//! driver = "analog"
//! path = "/sys/bus/iio/devices/iio:device0/in_voltage0_raw"
//! ```

mod board;

pub use board::{
    BoardConfig, ControlSection, DriverConfig, RuntimeSection, SensorEntry, TransportSection,
};

use canode_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse board config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize board config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid control contract: {0}")]
    Contract(#[from] ProtocolError),

    #[error("Invalid board config: {0}")]
    Invalid(String),
}
