//! mapdraft command line entry point.

mod cli;
mod commands;
mod error;
mod host;

use clap::Parser;
use cli::{Cli, Command};
use error::AppResult;

fn run(command: Command) -> AppResult<()> {
    match command {
        Command::Render(args) => commands::render(&args),
        Command::Check { document } => commands::check(&document).map(|_| ()),
        Command::Save { document, store } => commands::save(&document, store.as_deref()).map(|_| ()),
        Command::List { store } => commands::list(store.as_deref()).map(|_| ()),
    }
}

fn main() {
    env_logger::init();
    log::info!("Starting mapdraft");

    let cli = Cli::parse();
    if let Err(err) = run(cli.command) {
        log::error!("{}", err);
        eprintln!("mapdraft: {}", err);
        std::process::exit(1);
    }
}
