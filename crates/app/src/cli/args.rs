pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sealnote")]
#[command(about = "End-to-end encrypted notes with key sharing and ephemeral links")]
pub struct Args {
    /// Path to the sealnote config directory (defaults to ~/.sealnote)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
