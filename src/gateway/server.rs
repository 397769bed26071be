//! Proxy server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use super::router::{AppState, create_router};
use crate::config::Config;
use crate::service::LibTools;
use crate::{Error, Result};

/// LibApps proxy server
pub struct Gateway {
    /// Configuration
    config: Config,
    /// Shared service
    service: Arc<LibTools>,
}

impl Gateway {
    /// Create a new server from validated configuration
    pub fn new(config: Config) -> Result<Self> {
        let service = Arc::new(LibTools::from_config(&config)?);
        Ok(Self { config, service })
    }

    /// Run until Ctrl-C or SIGTERM
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let state = Arc::new(AppState {
            service: Arc::clone(&self.service),
        });
        let mount_path = self.config.server.mount_path.trim_end_matches('/');
        let app = create_router(state, mount_path, self.config.server.request_timeout);

        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("LIBTOOLS v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(upstream = %self.config.libapps.base_url, "Upstream");
        for site in self.config.sites.iter() {
            if site.search_name.is_some() {
                info!("  {mount_path}/{}/details | availability | hours/today", site.slug);
            } else {
                info!("  {mount_path}/{}/hours/today", site.slug);
            }
        }
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
