//! Per-call cancellation and deadlines
//!
//! Every backend round-trip a provider makes is run through a [`CallContext`].
//! Cancelling the token or passing the deadline drops the in-flight request
//! and surfaces [`ScmError::Cancelled`] or [`ScmError::DeadlineExceeded`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::ScmError;

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the context to an existing cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Set a deadline `timeout` from now. An earlier deadline is kept.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        match self.deadline {
            Some((existing, _)) if existing <= candidate => {}
            _ => self.deadline = Some((candidate, timeout)),
        }
        self
    }

    /// Derive a context that is cancelled along with this one but can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run one unit of backend work under this context.
    pub async fn run<F, T>(&self, work: F) -> Result<T, ScmError>
    where
        F: Future<Output = Result<T, ScmError>>,
    {
        if self.token.is_cancelled() {
            return Err(ScmError::Cancelled);
        }

        let guarded = async {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(ScmError::Cancelled),
                result = work => result,
            }
        };

        match self.deadline {
            Some((deadline, timeout)) => tokio::time::timeout_at(deadline, guarded)
                .await
                .map_err(|_| ScmError::DeadlineExceeded(timeout))?,
            None => guarded.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_through_result() {
        let ctx = CallContext::new();
        let value = ctx.run(async { Ok::<_, ScmError>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let ctx = CallContext::new();
        ctx.cancel();
        let result = ctx.run(async { Ok::<_, ScmError>(()) }).await;
        assert!(matches!(result, Err(ScmError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_work() {
        let ctx = CallContext::new();
        let token = ctx.cancellation_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, ScmError>(())
            })
            .await;
        assert!(matches!(result, Err(ScmError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let ctx = CallContext::new().with_timeout(Duration::from_secs(1));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ScmError>(())
            })
            .await;
        assert!(matches!(
            result,
            Err(ScmError::DeadlineExceeded(d)) if d == Duration::from_secs(1)
        ));
    }

    #[tokio::test]
    async fn test_child_follows_parent_cancellation() {
        let parent = CallContext::new();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());

        let other_child = CallContext::new().child();
        other_child.cancel();
        assert!(other_child.is_cancelled());
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let ctx = CallContext::new()
            .with_timeout(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline.map(|(_, t)| t), Some(Duration::from_secs(1)));
    }
}
