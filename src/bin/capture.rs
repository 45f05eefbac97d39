use std::sync::Arc;

use anyhow::Result;
use tg_relay::{
    app, config,
    infrastructure::{directories, instance_guard::InstanceGuard, logging, shutdown},
    telegram::TelegramPlatform,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let sender = config.require_sender()?.to_string();
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths, "capture.log")?;

    let _guard = InstanceGuard::acquire(&paths.data_dir, "capture")?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let platform = Arc::new(TelegramPlatform::connect(&config, &paths).await?);
    match app::run_capture(
        platform,
        &config.target_group,
        &sender,
        paths.downloads_dir.clone(),
        shutdown,
    )
    .await?
    {
        Some(_) => tracing::info!(target: "lifecycle", "capture stopped"),
        None => tracing::info!(target: "lifecycle", "nothing to capture; exiting"),
    }
    Ok(())
}
