//! Command dispatch: bridges CLI args -> core engine -> output formatting.

pub mod apply;
pub mod config_cmd;
pub mod ipset;
pub mod render;
pub mod topology;
pub mod util;
pub mod validate;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Render(args) => render::handle(&args, global),
        Command::Apply(args) => apply::handle(&args, global).await,
        Command::Validate(args) => validate::handle(args, global).await,
        Command::Ipset(args) => ipset::handle(args, global),
        Command::Topology(args) => topology::handle(args, global),
        Command::Config(args) => config_cmd::handle(args, global),
        // Completions are handled before dispatch
        Command::Completions(_) => Ok(()),
    }
}
