use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Why an outbound call stopped before completing
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
}

/// Caller-supplied execution context for outbound calls.
///
/// Every network call made by a driver or a destination probe runs through
/// [`RequestContext::run`], so cancelling the token aborts the in-flight
/// request instead of letting it hang.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: CancellationToken,
    request_timeout: Duration,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl RequestContext {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            request_timeout,
        }
    }

    /// Bind the context to an existing token, e.g. the server's shutdown token.
    pub fn with_cancellation(cancel: CancellationToken, request_timeout: Duration) -> Self {
        Self {
            cancel,
            request_timeout,
        }
    }

    /// Context cancelled together with `self`, but cancellable on its own.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            request_timeout: self.request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `fut` unless the context is cancelled or the timeout elapses first.
    pub async fn run<T, E, F>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<Interrupted>,
    {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled.into());
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled.into()),
            result = tokio::time::timeout(self.request_timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(Interrupted::TimedOut(self.request_timeout).into()),
            },
        }
    }
}
