use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hark_cli::{check, run, Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let value = run(args).await?;
            println!("{value}");
        }
        Command::Check(args) => {
            check(args)?;
            println!("ok");
        }
    }
    Ok(())
}
