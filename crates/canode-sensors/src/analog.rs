//! 模拟量传感器
//!
//! 数据帧载荷固定为 2 字节：原始读数的大端序表示。

use canode_node::{SensorDriver, SensorError, SensorHeader};
use canode_protocol::NodeFrame;
use tracing::trace;

/// 模拟量数据帧载荷长度
pub const READING_LEN: usize = 2;

/// 原始读数 → 载荷（大端序）
pub fn encode_reading(reading: u16) -> [u8; READING_LEN] {
    reading.to_be_bytes()
}

/// 载荷 → 原始读数，长度不足时返回 `None`
pub fn decode_reading(payload: &[u8]) -> Option<u16> {
    match payload {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

/// 一路模拟量输入
pub trait AnalogInput: Send {
    /// 准备输入（配置引脚、检查设备存在），在节点启动时调用一次
    fn prepare(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    /// 读取一次原始值
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

/// 闭包形式的输入，便于板级代码接入自定义 ADC
impl<F> AnalogInput for F
where
    F: FnMut() -> Result<u16, SensorError> + Send,
{
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        self()
    }
}

/// 模拟量传感器驱动
#[derive(Debug)]
pub struct AnalogSensor<I> {
    input: I,
}

impl<I: AnalogInput> AnalogSensor<I> {
    pub fn new(input: I) -> Self {
        Self { input }
    }

    pub fn input(&self) -> &I {
        &self.input
    }
}

impl<I: AnalogInput> SensorDriver for AnalogSensor<I> {
    fn begin(&mut self, header: &SensorHeader) -> Result<(), SensorError> {
        self.input.prepare()?;
        trace!("Analog sensor '{}' ready", header.name);
        Ok(())
    }

    fn sample(&mut self, header: &SensorHeader, frame: &mut NodeFrame) -> Result<(), SensorError> {
        let reading = self.input.read_raw()?;
        frame.set_payload(&encode_reading(reading))?;
        trace!("Analog sensor '{}' reading {}", header.name, reading);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canode_protocol::IdKind;

    #[test]
    fn test_encode_decode_reading() {
        assert_eq!(encode_reading(0x0ABC), [0x0A, 0xBC]);
        assert_eq!(decode_reading(&[0x0A, 0xBC]), Some(0x0ABC));
        assert_eq!(decode_reading(&[0x0A, 0xBC, 0xFF]), Some(0x0ABC));
        assert_eq!(decode_reading(&[0x0A]), None);
    }

    #[test]
    fn test_sample_writes_big_endian_payload() {
        let mut next = 1020u16;
        let mut sensor = AnalogSensor::new(move || -> Result<u16, SensorError> {
            next += 1;
            Ok(next)
        });
        let header = SensorHeader::new("AnalogRaw0", 0x300, 10);
        sensor.begin(&header).unwrap();

        let mut frame = NodeFrame::empty(header.can_id, IdKind::Extended);
        sensor.sample(&header, &mut frame).unwrap();
        assert_eq!(frame.id, 0x300);
        assert_eq!(frame.data_slice(), &[0x03, 0xFD]); // 1021

        let mut frame = NodeFrame::empty(header.can_id, IdKind::Extended);
        sensor.sample(&header, &mut frame).unwrap();
        assert_eq!(decode_reading(frame.data_slice()), Some(1022));
    }

    #[test]
    fn test_read_failure_propagates() {
        let mut sensor =
            AnalogSensor::new(|| -> Result<u16, SensorError> { Err(SensorError::NotReady) });
        let header = SensorHeader::new("dead", 0x1, 10);
        let mut frame = NodeFrame::empty(header.can_id, IdKind::Standard);

        assert!(matches!(
            sensor.sample(&header, &mut frame),
            Err(SensorError::NotReady)
        ));
        assert_eq!(frame.len, 0);
    }
}
