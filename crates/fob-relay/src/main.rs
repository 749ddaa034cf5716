//! fob-relay - static dev server with live reload.
//!
//! Parses the command line, initializes logging and dispatches to the
//! selected command.

use clap::Parser;
use fob_relay::{cli, commands, error, logger, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    let result = match args.command {
        cli::Command::Serve(serve_args) => commands::serve_execute(serve_args).await,
        cli::Command::Config(config_args) => commands::config_execute(config_args).await,
        cli::Command::Watch(watch_args) => commands::watch_execute(watch_args).await,
    };

    result.map_err(error::relay_error_to_miette)
}
