//! Status board poller: producer daemon.

use std::env;
use std::time::Duration;

use clap::Parser;
use poller::{cli, hub_client};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = cli::Cli::parse();

    let ws_url =
        env::var("HUB_WS_URL").unwrap_or_else(|_| "ws://localhost:5000/poller".to_string());
    let api_key = env::var("X_API_KEY").map_err(|_| anyhow::anyhow!("X_API_KEY required"))?;

    match cli.command_or_default() {
        cli::Commands::Run {
            state_file,
            interval,
        } => {
            let state_file = hub_client::expand_path(&state_file);
            hub_client::run_ws_client(
                &ws_url,
                &api_key,
                &state_file,
                Duration::from_secs(interval.max(1)),
            )
            .await?;
        }
        cli::Commands::Send {
            door,
            one_on,
            two_on,
            printers,
        } => {
            let report = hub_client::switch_report(door, one_on, two_on, printers.as_deref())?;
            hub_client::send_once(&ws_url, &api_key, report).await?;
            println!("Report sent to {}", ws_url);
        }
    }

    Ok(())
}
