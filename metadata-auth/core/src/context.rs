use crate::{Error, Result};
use std::future::Future;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Carries the cancellation state of a single authentication request.
///
/// Every stage that blocks on the network runs its calls through [`Context::run`] so that a
/// canceled or expired request returns promptly instead of waiting on the cluster or Vault.
#[derive(Clone, Debug, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<time::Instant>,
}

// === impl Context ===

impl Context {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Sets a deadline relative to now. An earlier deadline is kept.
    pub fn with_timeout(self, timeout: time::Duration) -> Self {
        self.with_deadline(time::Instant::now() + timeout)
    }

    /// Sets an absolute deadline. An earlier deadline is kept.
    pub fn with_deadline(mut self, deadline: time::Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Ties this context to an externally-owned cancellation token, e.g. one that fires when the
    /// inbound connection closes.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn deadline(&self) -> Option<time::Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drives `fut` to completion unless the context is canceled or its deadline passes first.
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<Error>,
    {
        if self.is_canceled() {
            return Err(Error::Canceled);
        }

        let expired = async {
            match self.deadline {
                Some(deadline) => time::sleep_until(deadline).await,
                None => futures::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Canceled),
            _ = expired => Err(Error::DeadlineExceeded),
            res = fut => res.map_err(Into::into),
        }
    }
}
