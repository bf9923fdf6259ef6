use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, error};

/// A deferred work item executed against the queue's owner during a drain.
/// The second argument is the drain's tick time.
pub type Action<T> = Box<dyn FnOnce(&mut T, f64) + Send + 'static>;

struct Queued<T> {
    run_at: Option<f64>,
    action: Action<T>,
}

/// Ordered, single-consumer work queue: producers on any thread enqueue,
/// the owner drains synchronously during its own tick.
///
/// Enqueue order is drain order for immediate actions. Delayed actions run
/// in the first drain at or past their `run_at`, after that drain's ready
/// FIFO items. A closed queue discards enqueues, which is how late
/// completions for an unloaded cell are dropped.
pub struct ActionQueue<T> {
    tx: Sender<Queued<T>>,
    rx: Receiver<Queued<T>>,
    closed: Arc<AtomicBool>,
    waiting: Vec<Queued<T>>,
}

impl<T> std::fmt::Debug for ActionQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionQueue")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("waiting", &self.waiting.len())
            .finish()
    }
}

impl<T> Default for ActionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ActionQueue<T> {
    /// Create an open queue.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            closed: Arc::new(AtomicBool::new(false)),
            waiting: Vec::new(),
        }
    }

    /// A cloneable producer handle, usable from any thread.
    pub fn sender(&self) -> ActionSender<T> {
        ActionSender {
            tx: self.tx.clone(),
            closed: Arc::clone(&self.closed),
        }
    }

    /// Enqueue from the owning side.
    pub fn enqueue(&self, action: Action<T>) {
        self.sender().enqueue(action);
    }

    /// Enqueue an action that runs no earlier than `run_at`.
    pub fn enqueue_delayed(&self, run_at: f64, action: Action<T>) {
        self.sender().enqueue_delayed(run_at, action);
    }

    /// Close the queue: later enqueues are discarded, pending items drop.
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.waiting.clear();
        while self.rx.try_recv().is_ok() {}
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pull every action due at `now`, in FIFO order, with previously
    /// deferred delayed actions first. Not-yet-due delayed actions stay
    /// parked for a later drain.
    pub fn take_due(&mut self, now: f64) -> Vec<Action<T>> {
        let mut due = Vec::new();
        let mut parked = Vec::new();

        for item in self.waiting.drain(..) {
            match item.run_at {
                Some(at) if at > now => parked.push(item),
                _ => due.push(item.action),
            }
        }
        while let Ok(item) = self.rx.try_recv() {
            match item.run_at {
                Some(at) if at > now => parked.push(item),
                _ => due.push(item.action),
            }
        }
        self.waiting = parked;
        due
    }
}

/// Producer handle for an [`ActionQueue`].
pub struct ActionSender<T> {
    tx: Sender<Queued<T>>,
    closed: Arc<AtomicBool>,
}

impl<T> Clone for ActionSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<T> ActionSender<T> {
    /// Enqueue an immediate action. Discarded if the queue has closed.
    pub fn enqueue(&self, action: Action<T>) {
        self.send(Queued {
            run_at: None,
            action,
        });
    }

    /// Enqueue an action that runs no earlier than `run_at`.
    pub fn enqueue_delayed(&self, run_at: f64, action: Action<T>) {
        self.send(Queued {
            run_at: Some(run_at),
            action,
        });
    }

    fn send(&self, item: Queued<T>) {
        if self.closed.load(Ordering::SeqCst) {
            debug!("action discarded: queue closed");
            return;
        }
        // The receiver outlives every sender unless the queue closed
        // between the check above and here; either way the item is dropped.
        if self.tx.send(item).is_err() {
            debug!("action discarded: queue gone");
        }
    }
}

/// Run a batch of due actions against their owner, isolating each one so a
/// panicking action cannot starve the rest of the drain.
pub fn run_isolated<T>(target: &mut T, actions: Vec<Action<T>>, now: f64, context: &str) {
    for action in actions {
        let outcome = catch_unwind(AssertUnwindSafe(|| action(target, now)));
        if outcome.is_err() {
            error!(context, "queued action panicked; continuing drain");
        }
    }
}
