use std::sync::Arc;

use anyhow::Result;
use tg_relay::{
    app, config,
    infrastructure::{directories, logging, shutdown},
    telegram::TelegramPlatform,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths, "dispatch.log")?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let platform = Arc::new(TelegramPlatform::connect(&config, &paths).await?);
    match app::run_dispatch(platform, &config.target_group, &config.dispatch, shutdown).await? {
        Some(report) if report.interrupted => {
            tracing::info!(target: "lifecycle", sent = report.sent, "dispatch interrupted")
        }
        Some(_) => tracing::info!(target: "lifecycle", "dispatch complete"),
        None => tracing::info!(target: "lifecycle", "nothing to dispatch; exiting"),
    }
    Ok(())
}
