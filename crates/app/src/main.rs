// CLI modules
mod cli;
mod state;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Daemon, Dh, Init, Keygen, Version};

command_enum! {
    (Daemon, Daemon),
    (Dh, Dh),
    (Init, Init),
    (Keygen, Keygen),
    (Version, Version),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let ctx = cli::op::OpContext::new(args.config_path);

    let output = args.command.execute(&ctx).await?;
    println!("{}", output);
    Ok(())
}
