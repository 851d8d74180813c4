//! 子命令实现

mod check;
mod command;
mod run;

pub use check::CheckCommand;
pub use command::ControlCommandArgs;
pub use run::RunCommand;

use anyhow::{Context, Result};
use canode_config::BoardConfig;
use std::path::Path;

fn load_board(path: &Path) -> Result<BoardConfig> {
    BoardConfig::load_from_file(path)
        .with_context(|| format!("Failed to load board config {}", path.display()))
}
