//! # canode Sensors
//!
//! 节点可用的传感器驱动实现。
//!
//! - [`AnalogSensor`]：读取一路模拟量，以 2 字节大端序发送原始读数
//! - [`IioAnalogInput`]：Linux IIO sysfs 原始值文件（`in_voltageN_raw`）

pub mod analog;
pub mod iio;

pub use analog::{AnalogInput, AnalogSensor, READING_LEN, decode_reading, encode_reading};
pub use iio::IioAnalogInput;
