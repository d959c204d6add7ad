//! Transports serving [`DbService`](crate::mcp::DbService).
//!
//! - `stdio`: JSON-RPC over stdin/stdout, the usual mode for local clients
//! - `http`: streamable HTTP behind an axum router

pub mod http;
pub mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use crate::db::ConnectionManager;
use crate::error::DbResult;
use crate::mcp::DbService;
use crate::tools::ToolSettings;
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

/// An MCP transport. `run` blocks until shutdown.
pub trait Transport: Send + Sync {
    fn run(&self) -> impl Future<Output = DbResult<()>> + Send;

    fn name(&self) -> &'static str;
}

/// Shared state every transport hands to the services it creates.
#[derive(Clone)]
pub struct ServiceFactory {
    connection_manager: Arc<ConnectionManager>,
    settings: Arc<ToolSettings>,
}

impl ServiceFactory {
    pub fn new(connection_manager: Arc<ConnectionManager>, settings: Arc<ToolSettings>) -> Self {
        Self {
            connection_manager,
            settings,
        }
    }

    pub fn service(&self) -> DbService {
        DbService::new(self.connection_manager.clone(), self.settings.clone())
    }

    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.connection_manager
    }
}

/// Resolve on SIGINT or SIGTERM.
pub(crate) async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
