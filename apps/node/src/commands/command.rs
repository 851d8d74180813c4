//! 发送休眠/唤醒指令帧

use super::load_board;
use anyhow::Result;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerCommand {
    Sleep,
    Wake,
}

#[derive(Args, Debug)]
pub struct ControlCommandArgs {
    /// 指令类型
    #[arg(value_enum)]
    pub kind: PowerCommand,

    /// 板级配置文件（取其中的控制约定）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 覆盖配置中的 CAN 接口
    #[arg(short, long)]
    pub interface: Option<String>,
}

impl ControlCommandArgs {
    pub fn execute(self) -> Result<()> {
        let board = load_board(&self.config)?;
        let contract = board.control_contract();

        let frame = match self.kind {
            PowerCommand::Sleep => contract.sleep_frame(),
            PowerCommand::Wake => contract.wake_frame().ok_or_else(|| {
                anyhow::anyhow!("Control contract has no wake rule; nodes wake on bus activity")
            })?,
        };

        let interface = self
            .interface
            .unwrap_or_else(|| board.transport.interface.clone());
        send_frame(&interface, &frame)?;
        println!(
            "✅ Sent {:?} command on {} (ID=0x{:X})",
            self.kind, interface, frame.id
        );
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn send_frame(interface: &str, frame: &canode_protocol::NodeFrame) -> Result<()> {
    use anyhow::Context;
    use canode_can::{BusTransport, SocketCanTransport};

    let mut transport = SocketCanTransport::new(interface);
    transport
        .begin()
        .with_context(|| format!("Failed to open {}", interface))?;
    transport
        .send(frame)
        .with_context(|| format!("Failed to send command on {}", interface))?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn send_frame(interface: &str, _frame: &canode_protocol::NodeFrame) -> Result<()> {
    anyhow::bail!(
        "Cannot open {}: the SocketCAN transport is only available on Linux",
        interface
    )
}
