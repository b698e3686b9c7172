use clap::Parser;
use tracing_subscriber::EnvFilter;

use tremorwatch_lib::config::Args;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    if let Err(e) = tremorwatch_lib::run(args).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
