//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`validate`], or [`health`]. Each
//! handler lives in its own submodule.

pub mod health;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::UnderstudyError;

pub async fn dispatch(cli: Cli) -> Result<(), UnderstudyError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args).await,
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  understudy v{version} \u{2014} HTTP fallback proxy\n\n  \
         No command provided. To get started:\n\n    \
         understudy run --root ./public --upstream http://fallback:8080\n    \
         understudy run -c understudy.yaml    Start with a config file\n    \
         understudy --help                    See all commands and options\n"
    );
}
