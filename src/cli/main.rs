use std::path::PathBuf;

use clap::Parser;

use crate::Commands;

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(
    version = "0.1.0",
    about = "Analyze GitHub repositories with Gemini and keep audit notes"
)]
pub struct Cli {
    /// Path to the note collection file
    #[clap(long, value_parser)]
    pub data_file: Option<PathBuf>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the code-notes-auditor application
    #[clap(subcommand)]
    pub command: Commands,
}
