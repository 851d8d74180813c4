//! 运行节点

use super::load_board;
use anyhow::Result;
use canode_config::BoardConfig;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RunCommand {
    /// 板级配置文件（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 覆盖配置中的 CAN 接口（如 vcan0）
    #[arg(short, long)]
    pub interface: Option<String>,
}

impl RunCommand {
    pub fn execute(self) -> Result<()> {
        let board = load_board(&self.config)?;
        let interface = self
            .interface
            .unwrap_or_else(|| board.transport.interface.clone());
        run_node(&board, &interface)
    }
}

#[cfg(target_os = "linux")]
fn run_node(board: &BoardConfig, interface: &str) -> Result<()> {
    use crate::board::{build_sensors, logging_hooks};
    use anyhow::Context;
    use canode_can::SocketCanTransport;
    use canode_node::{DelayWait, NodeBuilder};
    use tracing::info;

    let transport = SocketCanTransport::new(interface)
        .with_bitrate(board.transport.bitrate)
        .with_rx_capacity(board.transport.rx_queue_capacity);

    let mut node = NodeBuilder::new(transport)
        .contract(board.control_contract())
        .sensors(build_sensors(board))
        .hooks(logging_hooks(interface))
        .low_power_wait(DelayWait::new(board.low_power_period()))
        .config(board.node_config())
        .build()
        .with_context(|| format!("Failed to start node on {}", interface))?;

    let handle = node.handle();
    ctrlc::set_handler(move || {
        info!("Interrupt received, stopping node");
        handle.stop();
    })
    .context("Failed to install Ctrl-C handler")?;

    node.run();

    let metrics = node.metrics();
    info!(
        "Sent {} frames ({} failed), {} sleep / {} wake transitions",
        metrics.frames_sent,
        metrics.send_failures,
        metrics.sleep_transitions,
        metrics.wake_transitions
    );
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run_node(_board: &BoardConfig, interface: &str) -> Result<()> {
    anyhow::bail!(
        "Cannot open {}: the SocketCAN transport is only available on Linux",
        interface
    )
}
