//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};

/// Berth - build C/C++ libraries with isolated nested builds
#[derive(Parser)]
#[command(name = "berth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the library, its nested dependency and its test executable
    Build(BuildArgs),

    /// Build, then install the library and its libroot descriptor
    Install(BuildArgs),

    /// Build, then run the test executable
    Test(BuildArgs),

    /// Remove build artifacts
    Clean(CleanArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Build in release mode
    #[arg(short, long)]
    pub release: bool,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Also remove the whole .berth directory
    #[arg(long)]
    pub all: bool,
}
