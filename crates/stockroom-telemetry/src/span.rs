//! Process-level span helpers.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the process span entered for the lifetime of a command.
pub struct ProcessSpanGuard {
    _guard: Entered<'static>,
}

impl ProcessSpanGuard {
    /// Enter a span tagging every event with the command and build id.
    #[must_use]
    pub fn new(command: &str, request_id: &str) -> Self {
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "stockroom",
            command = %command,
            request_id = %request_id,
            build_sha = %build_sha()
        )));
        Self {
            _guard: span.enter(),
        }
    }
}
