//! Per-request trace context.
//!
//! Every engine and mutation entry point takes a `&TraceContext` and emits
//! its events under the context's span, so log lines from one report or one
//! override can be correlated by `request_id`.

use tracing::Span;
use uuid::Uuid;

/// Correlation data for a single request.
#[derive(Debug, Clone)]
pub struct TraceContext {
    request_id: Uuid,
    operation: &'static str,
    span: Span,
}

impl TraceContext {
    /// Start a new context for `operation` with a fresh request id.
    pub fn new(operation: &'static str) -> Self {
        Self::with_request_id(operation, Uuid::new_v4())
    }

    pub fn with_request_id(operation: &'static str, request_id: Uuid) -> Self {
        let span = tracing::info_span!("attainment", %request_id, operation);
        Self {
            request_id,
            operation,
            span,
        }
    }

    /// A context whose span is disabled. Useful in tests and benches.
    pub fn detached() -> Self {
        Self {
            request_id: Uuid::nil(),
            operation: "detached",
            span: Span::none(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
