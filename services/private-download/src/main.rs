//! Private Download Service - 私有文件下载服务入口

use std::net::SocketAddr;
use std::sync::Arc;

use pd_config::AppConfig;
use pd_telemetry::{init_metrics, init_tracing, init_tracing_json};
use private_download::api::{AppState, router};
use private_download::application::AccessAggregator;
use private_download::infrastructure::configure;
use private_download::runtime::shutdown_signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config_dir = std::env::var("PD_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let config = AppConfig::load(&config_dir)?;

    if config.is_production() {
        init_tracing_json(&config.telemetry.log_level);
    } else {
        init_tracing(&config.telemetry.log_level);
    }

    info!(
        app_name = %config.app_name,
        app_env = %config.app_env,
        "Starting private download service"
    );

    let metrics = if config.telemetry.metrics_enabled {
        match init_metrics() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Failed to install Prometheus recorder, metrics disabled");
                None
            }
        }
    } else {
        None
    };

    let aggregator = Arc::new(AccessAggregator::new());
    configure(&aggregator, &config.access)?;

    let shutdown = CancellationToken::new();
    let mut state = AppState::new(
        aggregator.clone(),
        &config.access.protected_root,
        shutdown.clone(),
    )?;
    if let Some(handle) = metrics {
        state = state.with_metrics(handle);
    }

    #[cfg(unix)]
    let _reload = private_download::runtime::spawn_reload_on_sighup(
        aggregator.clone(),
        config_dir.clone(),
        shutdown.clone(),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(
        %addr,
        protected_root = %state.protected_root.display(),
        "Private download service listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Private download service stopped");
    Ok(())
}
