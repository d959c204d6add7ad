//! Stdio transport.
//!
//! Logs must never reach stdout here; `main` only installs a subscriber
//! when logging is explicitly enabled, and it writes to stderr.

use crate::error::{DbError, DbResult};
use crate::transport::{ServiceFactory, Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};

pub struct StdioTransport {
    factory: ServiceFactory,
}

impl StdioTransport {
    pub fn new(factory: ServiceFactory) -> Self {
        Self { factory }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let running = self
            .factory
            .service()
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let interrupted = tokio::select! {
            result = running.waiting() => {
                if let Err(e) = result {
                    warn!(error = %e, "Stdio transport error");
                    return Err(DbError::internal(format!("Stdio transport error: {}", e)));
                }
                info!("Client disconnected");
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received");
                true
            }
        };

        self.factory.connection_manager().close_all().await;

        if interrupted {
            // A blocking stdin read cannot be cancelled; leave explicitly.
            std::process::exit(0);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
