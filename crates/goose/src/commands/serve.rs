//! Development server command.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use goose_server::{DevServer, DevServerConfig};
use goose_static::BuildConfig;

use crate::config::ServeSettings;

/// Serve the built site and rebuild on changes until Ctrl-C.
pub async fn run(
    source: &Path,
    build: BuildConfig,
    settings: &ServeSettings,
    open: bool,
) -> Result<()> {
    let config = DevServerConfig {
        build,
        watch_dir: source.to_path_buf(),
        host: settings.host.clone(),
        port: settings.port,
        debounce: Duration::from_millis(settings.debounce_ms),
        open,
    };

    DevServer::new(config).run(ctrl_c()).await?;

    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        // Without a signal handler there is no way to stop; keep serving.
        std::future::pending::<()>().await;
    }
}
