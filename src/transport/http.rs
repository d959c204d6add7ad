//! Streamable HTTP transport.

use crate::error::{DbError, DbResult};
use crate::transport::{ServiceFactory, Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Open SSE streams can hold a graceful shutdown forever; give up after this.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpTransport {
    factory: ServiceFactory,
    host: String,
    port: u16,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        factory: ServiceFactory,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            factory,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn router(&self) -> axum::Router {
        let factory = self.factory.clone();
        let service = StreamableHttpService::new(
            move || Ok(factory.service()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service rejects "/", so the root endpoint uses a fallback.
        if self.endpoint == "/" {
            axum::Router::new().fallback_service(service)
        } else {
            axum::Router::new().nest_service(&self.endpoint, service)
        }
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;
        info!(addr = %bind_addr, endpoint = %self.endpoint, "MCP HTTP endpoint ready");

        let shutdown = Arc::new(tokio::sync::Notify::new());
        let notify = shutdown.clone();
        let server = axum::serve(listener, self.router()).with_graceful_shutdown(async move {
            wait_for_signal().await;
            notify.notify_one();
        });

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!(error = %e, "HTTP server error");
                    return Err(DbError::internal(format!("HTTP server error: {}", e)));
                }
                info!("HTTP server stopped");
            }
            _ = async {
                shutdown.notified().await;
                info!(timeout_secs = GRACEFUL_TIMEOUT.as_secs(), "Draining connections");
                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => warn!("Graceful shutdown timed out"),
                    _ = wait_for_signal() => warn!("Second signal, exiting now"),
                }
            } => {}
        }

        self.factory.connection_manager().close_all().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
