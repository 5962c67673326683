//! Isolated fan-out/fan-in.
//!
//! [`join_isolated`] runs every branch as its own task so that a panic, error,
//! or hang in one branch can never take its siblings down with it. Results come
//! back keyed and in input order.
//!
//! Branch tasks are owned by the join that spawned them. When a join is dropped,
//! or the branch that awaits it is aborted, every task it still holds is
//! aborted too, so nested joins stop as a whole.

use std::any::Any;
use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::PulseError;

/// Why a branch produced no value.
#[derive(Debug, Error)]
pub enum BranchError {
    /// The branch returned an error.
    #[error(transparent)]
    Failed(#[from] PulseError),

    /// The branch panicked.
    #[error("panicked: {0}")]
    Panicked(String),

    /// The branch exceeded its timeout and was aborted.
    #[error("timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),

    /// The branch task was cancelled by the runtime.
    #[error("cancelled")]
    Cancelled,
}

/// Bounds applied to every branch of one join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOptions {
    /// Per-branch timeout.
    pub timeout: Duration,
    /// Maximum branches in flight at once.
    pub concurrency: usize,
}

impl JoinOptions {
    /// Creates options with the given per-branch timeout and concurrency.
    #[must_use]
    pub const fn new(timeout: Duration, concurrency: usize) -> Self {
        Self {
            timeout,
            concurrency,
        }
    }
}

/// Runs every branch concurrently and returns one outcome per key, in input order.
///
/// Each branch is spawned as its own task and bounded by `options.timeout`; a
/// timed-out task is aborted along with any joins nested inside it. At most `options.concurrency` branches run at once
/// (zero is treated as one).
pub async fn join_isolated<K, T, F>(
    branches: Vec<(K, F)>,
    options: JoinOptions,
) -> Vec<(K, Result<T, BranchError>)>
where
    K: Send,
    T: Send + 'static,
    F: Future<Output = Result<T, PulseError>> + Send + 'static,
{
    let limit = options.concurrency.max(1);
    stream::iter(branches)
        .map(|(key, branch)| async move {
            let outcome = run_branch(branch, options.timeout).await;
            (key, outcome)
        })
        .buffered(limit)
        .collect()
        .await
}

/// Aborts the task when dropped instead of detaching it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_branch<T, F>(branch: F, timeout: Duration) -> Result<T, BranchError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, PulseError>> + Send + 'static,
{
    let mut task = AbortOnDrop(tokio::spawn(branch));
    match tokio::time::timeout(timeout, &mut task.0).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => Err(BranchError::Failed(err)),
        Ok(Err(join_err)) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic());
            warn!(panic = %message, "branch panicked");
            Err(BranchError::Panicked(message))
        }
        Ok(Err(_)) => Err(BranchError::Cancelled),
        Err(_) => {
            task.0.abort();
            debug!(timeout_secs = timeout.as_secs_f64(), "branch aborted after timeout");
            Err(BranchError::TimedOut(timeout))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
