//! One-at-a-time operation queue.
//!
//! All navigation mutations funnel through a [`SerialQueue`]: a single
//! worker task that owns the state and runs submitted async operations to
//! completion, strictly in submission order. An operation that suspends
//! (waiting on content readiness or a native transition) keeps its exclusive
//! hold on the state until it finishes, so no interleaving is possible. A
//! failed operation reports its error to its submitter and the worker moves
//! on to the next.

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};

use crate::error::{NavError, Result};

type Job<S> = Box<dyn for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, ()> + Send>;

/// Handle to a queue worker. Cloning shares the same queue; dropping the
/// last handle shuts the worker down.
pub struct SerialQueue<S> {
    jobs: mpsc::UnboundedSender<Job<S>>,
}

impl<S> Clone for SerialQueue<S> {
    fn clone(&self) -> Self {
        SerialQueue {
            jobs: self.jobs.clone(),
        }
    }
}

impl<S: Send + 'static> SerialQueue<S> {
    /// Spawns the worker task owning `state`. Requires a Tokio runtime.
    pub fn spawn(mut state: S) -> SerialQueue<S> {
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job<S>>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job(&mut state).await;
            }
        });
        SerialQueue { jobs }
    }

    /// Runs `op` against the state after all previously submitted operations
    /// have completed, and returns its result.
    pub async fn perform<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job<S> = Box::new(move |state| {
            Box::pin(async move {
                let result = op(state).await;
                // submitter may have gone away; the op still ran
                let _ = tx.send(result);
            })
        });
        self.jobs
            .send(job)
            .map_err(|_| NavError::IllegalState("navigation queue is shut down".into()))?;
        rx.await
            .map_err(|_| NavError::IllegalState("navigation queue is shut down".into()))?
    }
}
