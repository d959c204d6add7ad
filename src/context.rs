//! Per-call logging context.
//!
//! Each tool invocation builds a [`CallContext`] and passes it down
//! explicitly. It carries a request id and a `tracing` span, so everything
//! logged while serving the call (including export batch progress and
//! security rejections) is correlated without any process-wide logger state.

use tracing::{Span, info_span, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: Uuid,
    tool: &'static str,
    connection_id: Option<String>,
    span: Span,
}

impl CallContext {
    /// Start a context for one tool call.
    pub fn new(tool: &'static str, connection_id: Option<&str>) -> Self {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "tool_call",
            request_id = %request_id,
            tool,
            connection_id = connection_id.unwrap_or("-"),
        );
        Self {
            request_id,
            tool,
            connection_id: connection_id.map(String::from),
            span,
        }
    }

    /// A context with a disabled span, for use outside a server.
    pub fn detached(tool: &'static str) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            tool,
            connection_id: None,
            span: Span::none(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn tool(&self) -> &'static str {
        self.tool
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Record rejected input on the `security` target.
    pub fn security_event(&self, reason: &str) {
        let _guard = self.span.enter();
        warn!(
            target: "security",
            request_id = %self.request_id,
            tool = self.tool,
            reason,
            "Rejected input"
        );
    }
}
