mod scan;
mod settings;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Scan(args) => scan::run(args, cli.pretty).await,
        Command::Settings(args) => settings::run(args, cli.pretty),
    }
}
