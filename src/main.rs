use std::error::Error;

use clap::Parser;
use steamhistory::{
    cli::{dispatcher::Context, model::Cli},
    config::HistoryConfig,
    history::{History, registry::StoreRegistry},
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    debug!("steamhistory v{}", env!("CARGO_PKG_VERSION"));

    let cfg = HistoryConfig::load(&cli.config)?;
    let data_dir = cfg.resolved_data_directory()?;
    debug!(data_dir = %data_dir.display(), "using history directory");

    let ctx = Context {
        history: History::new(StoreRegistry::new(data_dir)),
        cfg,
    };

    if let Some(out) = cli.command.dispatch(&ctx).await? {
        println!("{out}");
    }

    Ok(())
}
