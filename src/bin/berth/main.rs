//! Berth CLI - build C/C++ libraries with isolated nested builds

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("berth=debug")
    } else {
        EnvFilter::new("berth=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build(args) => commands::build::execute(args).map(|_| 0),
        Commands::Install(args) => commands::install::execute(args).map(|_| 0),
        Commands::Test(args) => commands::test::execute(args),
        Commands::Clean(args) => commands::clean::execute(args).map(|_| 0),
    }
}
