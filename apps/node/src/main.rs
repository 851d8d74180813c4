//! # canode
//!
//! 在 Linux 主机上运行 CAN 传感器节点（SocketCAN），或向总线发送休眠/唤醒指令。
//!
//! ```bash
//! # 校验板级配置
//! canode check --config boards/example.toml
//!
//! # 运行节点（Ctrl-C 退出）
//! canode run --config boards/example.toml --interface vcan0
//!
//! # 让总线上的节点休眠 / 唤醒
//! canode command sleep --config boards/example.toml
//! canode command wake --config boards/example.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod board;
mod commands;

use commands::{CheckCommand, ControlCommandArgs, RunCommand};

/// canode - CAN 传感器节点
#[derive(Parser, Debug)]
#[command(name = "canode")]
#[command(about = "Run a CAN sensor node or send it power commands", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行节点
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 校验板级配置
    Check {
        #[command(flatten)]
        args: CheckCommand,
    },

    /// 发送休眠/唤醒指令帧
    Command {
        #[command(flatten)]
        args: ControlCommandArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("canode=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { args } => args.execute(),
        Commands::Check { args } => args.execute(),
        Commands::Command { args } => args.execute(),
    }
}
