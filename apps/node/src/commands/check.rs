//! 校验板级配置

use super::load_board;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CheckCommand {
    /// 板级配置文件（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 输出补全默认值后的配置
    #[arg(long)]
    pub print: bool,
}

impl CheckCommand {
    pub fn execute(self) -> Result<()> {
        let board = load_board(&self.config)?;
        let contract = board.control_contract();

        println!("✅ {} is valid", self.config.display());
        println!(
            "  transport: {} @ {} bit/s",
            board.transport.interface, board.transport.bitrate
        );
        println!(
            "  control: {:?} IDs, byte[{}], sleep 0x{:X}/0x{:02X}, wake {}",
            contract.kind,
            contract.command_byte_index,
            contract.sleep.id,
            contract.sleep.byte,
            contract
                .wake
                .map(|w| format!("0x{:X}/0x{:02X}", w.id, w.byte))
                .unwrap_or_else(|| "hardware detect only".to_string())
        );
        println!(
            "  sensors: {} configured, {} active",
            board.sensors.len(),
            board.active_sensor_count()
        );
        for sensor in &board.sensors {
            println!(
                "    - {} id=0x{:X} every {} ms",
                sensor.name, sensor.can_id, sensor.poll_interval_ms
            );
        }

        report_interface(&board.transport.interface);

        if self.print {
            println!();
            print!("{}", board.to_toml_string()?);
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn report_interface(interface: &str) {
    match canode_can::socketcan::check_interface_status(interface) {
        Ok(true) => println!("  interface {} is UP", interface),
        Ok(false) => println!("⚠️  interface {} is DOWN", interface),
        Err(e) => println!("⚠️  {}", e),
    }
}

#[cfg(not(target_os = "linux"))]
fn report_interface(_interface: &str) {}
