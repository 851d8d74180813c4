//! Linux IIO 模拟量输入
//!
//! 读取 `/sys/bus/iio/devices/iio:deviceN/in_voltageM_raw` 形式的 sysfs 文件，
//! 每次采样重新读取整个文件（内核在读取时触发转换）。

use crate::analog::AnalogInput;
use canode_node::SensorError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct IioAnalogInput {
    path: PathBuf,
}

impl IioAnalogInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 解析 sysfs 原始值（允许首尾空白，超出 16 位视为无效）
fn parse_raw(text: &str) -> Result<u16, SensorError> {
    let trimmed = text.trim();
    let value: u64 = trimmed
        .parse()
        .map_err(|_| SensorError::InvalidReading(format!("'{}' is not an integer", trimmed)))?;
    u16::try_from(value).map_err(|_| {
        SensorError::InvalidReading(format!("{} exceeds 16-bit range", value))
    })
}

impl AnalogInput for IioAnalogInput {
    fn prepare(&mut self) -> Result<(), SensorError> {
        let metadata = fs::metadata(&self.path)?;
        if !metadata.is_file() {
            return Err(SensorError::Driver(format!(
                "{} is not a readable IIO channel",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn read_raw(&mut self) -> Result<u16, SensorError> {
        let text = fs::read_to_string(&self.path)?;
        parse_raw(&text)
    }
}
