use anyhow::Result;
use atmos_globe::cli::Cli;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    atmos_globe::run(cli).await
}
