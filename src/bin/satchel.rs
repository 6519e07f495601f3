//! Satchel CLI binary.

use std::process;

use clap::Parser;
use satchel::cli::{SatchelArgs, execute_command};
use tracing_subscriber::EnvFilter;

fn main() {
    let args = SatchelArgs::parse();

    // RUST_LOG wins over -v/-q.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = execute_command(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
