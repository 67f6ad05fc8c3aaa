use bookshare_gate::cli::{self, Cli, Command};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Api => cli::api::run().await,
        Command::Worker(args) => cli::worker::run(args).await,
        Command::Migrate => cli::migrate::run().await,
    }
}
