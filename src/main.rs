use anyhow::Result;
use clap::Parser;

use prehook::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let code = cli.run().await?;
    std::process::exit(code)
}
