//! 由板级配置构造传感器表与钩子

use canode_config::{BoardConfig, DriverConfig, SensorEntry};
use canode_node::{LifecycleHooks, SensorHeader, SensorSpec};
use canode_sensors::{AnalogSensor, IioAnalogInput};
use tracing::info;

/// 按配置顺序构造传感器
pub fn build_sensors(board: &BoardConfig) -> Vec<SensorSpec> {
    board.sensors.iter().map(build_sensor).collect()
}

fn build_sensor(entry: &SensorEntry) -> SensorSpec {
    let header = SensorHeader::new(entry.name.clone(), entry.can_id, entry.poll_interval_ms);
    match &entry.driver {
        DriverConfig::Analog { path } => {
            SensorSpec::new(header, AnalogSensor::new(IioAnalogInput::new(path.clone())))
        },
    }
}

/// 主机运行时的钩子：只记录状态切换
pub fn logging_hooks(interface: &str) -> LifecycleHooks {
    let setup_iface = interface.to_string();
    LifecycleHooks::new()
        .with_pre_setup(move || info!("Preparing node on {}", setup_iface))
        .with_before_sleep(|| info!("Sensors suspended, transceiver going to standby"))
        .with_after_wake(|| info!("Transceiver awake, sensors resumed"))
}
