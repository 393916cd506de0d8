//! Shutdown coordination for the daemon.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Every watch task and the admin server hold a token from [`Shutdown::token`].
/// A trigger is sticky: tokens taken after it are already cancelled.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when shutdown is triggered.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once shutdown has been triggered.
    pub async fn wait(&self) {
        self.token.cancelled().await
    }
}

/// Wait for `tasks` to finish, abandoning whatever is still running after
/// `deadline`. Returns the number of tasks that finished in time.
pub async fn drain(tasks: Vec<JoinHandle<()>>, deadline: Duration) -> usize {
    let total = tasks.len();
    let mut finished = 0;
    let wait_all = async {
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Task ended abnormally during shutdown");
            }
            finished += 1;
        }
    };

    let timed_out = tokio::time::timeout(deadline, wait_all).await.is_err();
    if timed_out {
        tracing::warn!(finished, total, "Shutdown deadline reached with tasks still running");
    }
    finished
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokens_see_trigger() {
        let shutdown = Shutdown::new();
        let token = shutdown.token();

        let task = tokio::spawn(async move { token.cancelled().await });
        shutdown.trigger();

        assert_eq!(drain(vec![task], Duration::from_secs(1)).await, 1);
    }

    #[tokio::test]
    async fn test_trigger_before_wait_is_not_lost() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();

        assert!(shutdown.is_triggered());
        assert!(shutdown.token().is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("late waiter must see an earlier trigger");
    }

    #[tokio::test]
    async fn test_drain_gives_up_at_deadline() {
        let stuck = tokio::spawn(std::future::pending::<()>());
        assert_eq!(drain(vec![stuck], Duration::from_millis(20)).await, 0);
    }
}
