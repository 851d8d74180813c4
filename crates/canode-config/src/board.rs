//! 板级配置结构与校验

use crate::ConfigError;
use canode_node::NodeConfig;
use canode_protocol::{CommandRule, ControlContract, IdKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 完整板级配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    #[serde(default)]
    pub transport: TransportSection,

    /// 省略时使用系统默认约定（含唤醒规则）
    #[serde(default)]
    pub control: ControlSection,

    #[serde(default)]
    pub runtime: RuntimeSection,

    /// 按轮询顺序排列
    #[serde(default)]
    pub sensors: Vec<SensorEntry>,
}

/// 收发器接线
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportSection {
    /// SocketCAN 接口名
    pub interface: String,
    /// 仲裁段波特率（仅用于日志和接口检查提示，接口由系统配置）
    pub bitrate: u32,
    /// 驱动接收队列容量
    pub rx_queue_capacity: usize,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
            bitrate: 500_000,
            rx_queue_capacity: 64,
        }
    }
}

/// 控制约定
///
/// `[control]` 段中省略 `wake` 表示只依赖收发器的硬件唤醒检测。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlSection {
    #[serde(default = "default_extended_ids")]
    pub extended_ids: bool,
    #[serde(default)]
    pub command_byte_index: u8,
    pub sleep: CommandRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wake: Option<CommandRule>,
}

fn default_extended_ids() -> bool {
    true
}

impl Default for ControlSection {
    fn default() -> Self {
        let contract = ControlContract::default();
        Self {
            extended_ids: contract.kind.is_extended(),
            command_byte_index: contract.command_byte_index,
            sleep: contract.sleep,
            wake: contract.wake,
        }
    }
}

impl ControlSection {
    pub fn contract(&self) -> ControlContract {
        ControlContract {
            kind: IdKind::from_extended(self.extended_ids),
            command_byte_index: self.command_byte_index,
            sleep: self.sleep,
            wake: self.wake,
        }
    }
}

/// 节点循环参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSection {
    /// 清醒状态 tick 间隔（毫秒），0 表示忙循环
    pub tick_period_ms: u64,
    /// 休眠状态低功耗等待时长（毫秒）
    pub low_power_poll_ms: u64,
    /// 单次排空最多处理的入站帧数
    pub max_frames_per_drain: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            tick_period_ms: 1,
            low_power_poll_ms: 5,
            max_frames_per_drain: NodeConfig::DEFAULT_MAX_FRAMES_PER_DRAIN,
        }
    }
}

/// 传感器条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEntry {
    pub name: String,
    pub can_id: u32,
    /// 0 表示禁用
    pub poll_interval_ms: u32,
    #[serde(flatten)]
    pub driver: DriverConfig,
}

/// 驱动类型及其参数（以 `driver` 字段区分）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum DriverConfig {
    /// IIO sysfs 原始值文件
    Analog { path: PathBuf },
}

impl BoardConfig {
    /// 从文件加载并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 检查配置是否自洽
    ///
    /// # Errors
    /// - `ConfigError::Contract`: 控制约定不合法
    /// - `ConfigError::Invalid`: 其余字段不合法（空接口名、重复传感器等）
    pub fn validate(&self) -> Result<(), ConfigError> {
        let contract = self.control_contract();
        contract.validate()?;

        if self.transport.interface.is_empty() {
            return Err(ConfigError::Invalid("transport.interface is empty".into()));
        }
        if self.transport.bitrate == 0 {
            return Err(ConfigError::Invalid("transport.bitrate must be > 0".into()));
        }
        if self.transport.rx_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "transport.rx_queue_capacity must be > 0".into(),
            ));
        }
        if self.runtime.max_frames_per_drain == 0 {
            return Err(ConfigError::Invalid(
                "runtime.max_frames_per_drain must be > 0".into(),
            ));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for sensor in &self.sensors {
            if sensor.name.is_empty() {
                return Err(ConfigError::Invalid("sensor name is empty".into()));
            }
            if !names.insert(sensor.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate sensor name '{}'",
                    sensor.name
                )));
            }
            if !contract.kind.accepts(sensor.can_id) {
                return Err(ConfigError::Invalid(format!(
                    "sensor '{}': CAN ID 0x{:X} does not fit {:?} frames",
                    sensor.name, sensor.can_id, contract.kind
                )));
            }
            if !ids.insert(sensor.can_id) {
                return Err(ConfigError::Invalid(format!(
                    "sensor '{}': CAN ID 0x{:X} already used",
                    sensor.name, sensor.can_id
                )));
            }
            match &sensor.driver {
                DriverConfig::Analog { path } if path.as_os_str().is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "sensor '{}': analog path is empty",
                        sensor.name
                    )));
                },
                DriverConfig::Analog { .. } => {},
            }
        }

        Ok(())
    }

    pub fn control_contract(&self) -> ControlContract {
        self.control.contract()
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            tick_period: Duration::from_millis(self.runtime.tick_period_ms),
            max_frames_per_drain: self.runtime.max_frames_per_drain,
        }
    }

    pub fn low_power_period(&self) -> Duration {
        Duration::from_millis(self.runtime.low_power_poll_ms)
    }

    /// 参与轮询的传感器数
    pub fn active_sensor_count(&self) -> usize {
        self.sensors.iter().filter(|s| s.poll_interval_ms > 0).count()
    }
}
