use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

/// Counting semaphore bounding how many transcription requests are in
/// flight at once. Excess callers queue in FIFO order; a released permit
/// is handed directly to the head waiter so the outstanding count never
/// exceeds the cap.
pub struct ConcurrencyGate {
    max_permits: usize,
    inner: Mutex<GateInner>,
}

#[derive(Default)]
struct GateInner {
    outstanding: usize,
    waiters: VecDeque<oneshot::Sender<Permit>>,
}

/// An acquired concurrency slot. Dropping it releases the slot, which is
/// what guarantees release on every exit path.
pub struct Permit {
    gate: Arc<ConcurrencyGate>,
    armed: bool,
}

impl ConcurrencyGate {
    pub fn new(max_permits: usize) -> Arc<Self> {
        Arc::new(Self {
            max_permits: max_permits.max(1),
            inner: Mutex::new(GateInner::default()),
        })
    }

    /// Resolves immediately while permits are free, otherwise suspends the
    /// caller until earlier holders release, in arrival order.
    pub async fn acquire(self: &Arc<Self>) -> Permit {
        loop {
            let rx = {
                let mut inner = self.inner.lock();
                if inner.outstanding < self.max_permits {
                    inner.outstanding += 1;
                    trace!(outstanding = inner.outstanding, "permit acquired");
                    return Permit {
                        gate: Arc::clone(self),
                        armed: true,
                    };
                }
                let (tx, rx) = oneshot::channel();
                inner.waiters.push_back(tx);
                rx
            };

            match rx.await {
                Ok(permit) => return permit,
                // Sender dropped without a grant; re-enter the queue.
                Err(_) => continue,
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().outstanding
    }

    pub fn waiting(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    fn release(self: &Arc<Self>) {
        loop {
            let tx = {
                let mut inner = self.inner.lock();
                match inner.waiters.pop_front() {
                    Some(tx) => tx,
                    None => {
                        inner.outstanding = inner.outstanding.saturating_sub(1);
                        trace!(outstanding = inner.outstanding, "permit released");
                        return;
                    }
                }
            };

            // Hand the slot straight to the head waiter; the outstanding
            // count is unchanged while the permit is in transit.
            let permit = Permit {
                gate: Arc::clone(self),
                armed: true,
            };
            match tx.send(permit) {
                Ok(()) => return,
                Err(mut bounced) => {
                    // Waiter cancelled; disarm the bounced guard and pass
                    // the slot to the next in line.
                    bounced.armed = false;
                }
            }
        }
    }
}

impl Permit {
    /// Explicit release; equivalent to dropping the permit.
    pub fn release(self) {}
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            self.gate.release();
        }
    }
}
