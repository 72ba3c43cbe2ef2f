//! Command dispatch: bridges CLI args -> core calls -> output formatting.

pub mod airflow;
pub mod devices;
pub mod setup;
pub mod status;
pub mod util;
pub mod watch;

use clap::CommandFactory;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Setup(args) => setup::handle(args, global).await,
        Command::Status(args) => status::handle(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        Command::Airflow(args) => airflow::handle(args, global).await,
        Command::Devices(args) => devices::handle(args, global),
        Command::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "ventlink", &mut std::io::stdout());
            Ok(())
        }
    }
}
