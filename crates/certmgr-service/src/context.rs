//! Per-request context: cancellation and the request's tracing span.

use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::error::{Error, Result};

/// Carries what a single lifecycle call needs from its caller.
///
/// Operations check [`RequestContext::ensure_active`] before every store
/// call, so cancelling the token abandons the operation at its next
/// checkpoint. Work inside a transaction that has not committed yet is
/// rolled back.
#[derive(Debug, Clone)]
pub struct RequestContext {
    token: CancellationToken,
    span: Span,
}

impl RequestContext {
    /// Creates a context with a fresh token, logging under `span`.
    #[must_use]
    pub fn new(span: Span) -> Self {
        Self {
            token: CancellationToken::new(),
            span,
        }
    }

    /// A context that is never canceled and logs under the current span.
    #[must_use]
    pub fn background() -> Self {
        Self::new(Span::current())
    }

    /// Replaces the cancellation token.
    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// The cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The span operations run in.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// Cancels the request.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the request has been canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fails with [`Error::Canceled`] once the request is canceled.
    pub fn ensure_active(&self, op: &'static str) -> Result<()> {
        if self.is_canceled() {
            return Err(Error::Canceled { op });
        }
        Ok(())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}
