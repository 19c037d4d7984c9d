//! 进程信号处理

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[cfg(unix)]
use std::sync::Arc;

#[cfg(unix)]
use crate::application::AccessAggregator;

/// 等待 Ctrl-C 或 SIGTERM，然后取消 `shutdown`
pub async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

/// 收到 SIGHUP 时重新读取配置并替换 provider
///
/// 受保护根目录只在启动时确定，重新加载不会改变它。
#[cfg(unix)]
pub fn spawn_reload_on_sighup(
    aggregator: Arc<AccessAggregator>,
    config_dir: String,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                error!(error = %e, "Failed to install SIGHUP handler, reload disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!(config_dir = %config_dir, "SIGHUP received, reloading access configuration");
                    match pd_config::AppConfig::load(&config_dir) {
                        Ok(config) => {
                            if let Err(e) = crate::infrastructure::reload(&aggregator, &config.access) {
                                error!(error = %e, "Failed to reload access providers");
                            }
                        }
                        Err(e) => error!(error = %e, "Failed to load configuration"),
                    }
                }
            }
        }
    })
}
