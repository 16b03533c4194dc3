//! hwsign command-line entry point
use std::io;
use std::rc::Rc;

use anyhow::Result;
use clap::Parser;
use hwsign::cli::Cli;
use hwsign::commands;
use hwsign::ui::{Prompt, Terminal};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("logging disabled: {}", e);
    }

    let prompt: Rc<dyn Prompt> = Rc::new(Terminal::new());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(err) = commands::run(cli, prompt, &mut out) {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout only carries command results.
fn init_logging(verbose: bool) -> Result<()> {
    let default = if verbose { "hwsign=debug" } else { "hwsign=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
