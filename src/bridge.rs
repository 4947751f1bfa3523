//! View lifecycle bridge.
//!
//! Native view elements are created empty; the content layer is asked to
//! render into them via a `createView` (or `updateView`) event and signals
//! back with `viewReady` once the first paint is in place. The bridge owns
//! that handshake: one single-shot waiter per component id, resolved by
//! `viewReady` or abandoned explicitly on teardown. Waiters are resolved
//! *outside* the operation queue, which is exactly what lets `reset` recover
//! an engine stalled on a readiness wait.
//!
//! The bridge also carries every outbound [`NavEvent`] to the embedder over
//! an unbounded channel; delivery is fire-and-forget.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::component::ComponentId;
use crate::error::{NavError, Result};
use crate::protocol::NavEvent;

/// How a readiness wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadyOutcome {
    /// The content layer called `viewReady`.
    Ready,
    /// The component was torn down before the content layer reported in.
    Abandoned,
}

pub(crate) struct ViewLifecycleBridge {
    waiters: Mutex<HashMap<ComponentId, oneshot::Sender<ReadyOutcome>>>,
    events: mpsc::UnboundedSender<NavEvent>,
}

impl ViewLifecycleBridge {
    pub(crate) fn new(events: mpsc::UnboundedSender<NavEvent>) -> ViewLifecycleBridge {
        ViewLifecycleBridge {
            waiters: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Emits `createView` and returns the receiver for the readiness signal.
    pub(crate) fn request_creation(
        &self,
        id: &ComponentId,
        path: &str,
        state: Option<&Value>,
        stack: Option<&ComponentId>,
    ) -> oneshot::Receiver<ReadyOutcome> {
        let rx = self.insert_waiter(id);
        self.emit(NavEvent::CreateView {
            id: id.clone(),
            path: path.to_string(),
            state: state.cloned(),
            stack: stack.cloned(),
        });
        rx
    }

    /// Emits `updateView` (content replacement in an existing element) and
    /// returns the receiver for the readiness signal.
    pub(crate) fn request_update(
        &self,
        id: &ComponentId,
        path: &str,
        state: Option<&Value>,
        stack: Option<&ComponentId>,
    ) -> oneshot::Receiver<ReadyOutcome> {
        let rx = self.insert_waiter(id);
        self.emit(NavEvent::UpdateView {
            id: id.clone(),
            path: path.to_string(),
            state: state.cloned(),
            stack: stack.cloned(),
        });
        rx
    }

    fn insert_waiter(&self, id: &ComponentId) -> oneshot::Receiver<ReadyOutcome> {
        let (tx, rx) = oneshot::channel();
        // a replaced waiter (same id re-requested) is abandoned
        if let Some(old) = self.waiters.lock().insert(id.clone(), tx) {
            let _ = old.send(ReadyOutcome::Abandoned);
        }
        rx
    }

    /// Resolves the readiness waiter for `id`. Called directly by the
    /// embedder, bypassing the operation queue.
    pub(crate) fn view_ready(&self, id: &ComponentId) -> Result<()> {
        match self.waiters.lock().remove(id) {
            Some(waiter) => {
                let _ = waiter.send(ReadyOutcome::Ready);
                Ok(())
            }
            None => {
                warn!(id = %id, "viewReady with no pending creation");
                Err(NavError::IllegalState(format!(
                    "no view creation pending for `{id}`"
                )))
            }
        }
    }

    /// Abandons the waiter for `id`, if any. Safe to call for ids without a
    /// pending wait.
    pub(crate) fn abandon(&self, id: &ComponentId) {
        if let Some(waiter) = self.waiters.lock().remove(id) {
            let _ = waiter.send(ReadyOutcome::Abandoned);
        }
    }

    /// Abandons every pending waiter. This is the first phase of `reset`.
    pub(crate) fn abandon_all(&self) {
        let waiters = std::mem::take(&mut *self.waiters.lock());
        for (id, waiter) in waiters {
            debug!(id = %id, "abandoning pending view creation");
            let _ = waiter.send(ReadyOutcome::Abandoned);
        }
    }

    pub(crate) fn emit(&self, event: NavEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped, discarding event");
        }
    }
}
