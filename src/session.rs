//! Scoped ownership of a stage session's background tasks.
//!
//! A stage adapter invocation owns a bounded set of tasks (sender,
//! receiver, keep-alive) that must never outlive it. [`Session`] makes
//! that ownership explicit: every task is spawned through the session,
//! and every exit path, whether normal completion, a failed sibling, or
//! the consumer abandoning the output stream, cancels the whole group.

use crate::error::{PipelineError, Result};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A cancellation scope owning a group of background tasks.
///
/// Dropping the session aborts every task still running, so tying a
/// session's lifetime to a stream or channel guarantees
/// cancellation-on-abandonment.
pub struct Session {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    err_tx: mpsc::UnboundedSender<PipelineError>,
    err_rx: mpsc::UnboundedReceiver<PipelineError>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        Self {
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            err_tx,
            err_rx,
        }
    }

    /// Token cancelled when the session shuts down or a task fails.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn a task bound to this session.
    ///
    /// The task runs until it completes, the session is cancelled, or a
    /// sibling fails. A task returning `Err` is fatal to the whole group:
    /// the error is recorded and every sibling is cancelled.
    pub fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let err_tx = self.err_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("session task '{name}' cancelled");
                }
                result = fut => {
                    if let Err(e) = result {
                        warn!("session task '{name}' failed: {e}");
                        let _ = err_tx.send(e);
                        cancel.cancel();
                    } else {
                        debug!("session task '{name}' finished");
                    }
                }
            }
        });
        self.tasks.push(handle);
    }

    /// Take the first recorded task failure, if any, without waiting.
    pub fn try_take_error(&mut self) -> Option<PipelineError> {
        self.err_rx.try_recv().ok()
    }

    /// Wait until some task in the group fails.
    ///
    /// Pends forever while all tasks are healthy, which makes it suitable
    /// as a `select!` arm beside the session's productive work.
    pub async fn recv_error(&mut self) -> PipelineError {
        if let Some(err) = self.err_rx.recv().await {
            err
        } else {
            // The session holds its own sender, so the channel can only
            // close once `self` is gone.
            std::future::pending().await
        }
    }

    /// Number of tasks spawned into this session.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel and release every task in the group. Idempotent: tasks that
    /// already finished or were already cancelled are simply skipped.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        for handle in self.tasks.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
        for handle in &self.tasks {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Sets a flag when dropped; lets tests observe that a pending task's
    /// future was torn down by cancellation.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn failing_task_cancels_siblings() {
        let mut session = Session::new();
        let sibling_torn_down = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&sibling_torn_down);

        session.spawn("sibling", async move {
            let _guard = DropFlag(flag);
            std::future::pending::<()>().await;
            Ok(())
        });
        session.spawn("failing", async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err(PipelineError::Transport("connection reset".into()))
        });

        let err = session.recv_error().await;
        assert!(matches!(err, PipelineError::Transport(_)));

        // Give the cancelled sibling a moment to unwind.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sibling_torn_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let mut session = Session::new();
        session.spawn("pending", async {
            std::future::pending::<()>().await;
            Ok(())
        });
        session.spawn("done", async { Ok(()) });
        tokio::time::sleep(Duration::from_millis(5)).await;

        session.shutdown();
        session.shutdown();
        assert_eq!(session.task_count(), 0);
    }

    #[tokio::test]
    async fn drop_aborts_running_tasks() {
        let torn_down = Arc::new(AtomicBool::new(false));
        {
            let mut session = Session::new();
            let flag = Arc::clone(&torn_down);
            session.spawn("pending", async move {
                let _guard = DropFlag(flag);
                std::future::pending::<()>().await;
                Ok(())
            });
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(torn_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn no_error_while_tasks_healthy() {
        let mut session = Session::new();
        session.spawn("ok", async { Ok(()) });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(session.try_take_error().is_none());
    }
}
