//! Correlation of replies to waiting callers.

use crate::message::{RequestId, Response};
use crate::Failure;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// What a caller eventually receives.
pub type Outcome = Result<Response, Failure>;

/// Maps request ids to the callers waiting on them.
///
/// Replies may arrive in any order; each is delivered to exactly the caller
/// that registered its id. Ids that are no longer registered (the caller
/// timed out, or was abandoned) are dropped.
///
/// # Examples
///
/// ```
/// use sheaf_worker::{Broker, Response};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let broker = Broker::default();
/// let (first, first_rx) = broker.register();
/// let (second, second_rx) = broker.register();
///
/// // Answered out of order.
/// broker.resolve(second, Ok(Response::PageCount(2)));
/// broker.resolve(first, Ok(Response::PageCount(1)));
///
/// assert_eq!(first_rx.await.unwrap(), Ok(Response::PageCount(1)));
/// assert_eq!(second_rx.await.unwrap(), Ok(Response::PageCount(2)));
/// # }
/// ```
#[derive(Default)]
pub struct Broker {
    next: AtomicU64,
    waiting: Mutex<HashMap<RequestId, oneshot::Sender<Outcome>>>,
}

impl Broker {
    /// Allocate a fresh id and the receiver its outcome will arrive on.
    pub fn register(&self) -> (RequestId, oneshot::Receiver<Outcome>) {
        let id = RequestId(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        (id, rx)
    }

    /// Deliver an outcome. Returns `false` if nobody is waiting for `id`.
    pub fn resolve(&self, id: RequestId, outcome: Outcome) -> bool {
        let Some(tx) = self.lock().remove(&id) else {
            tracing::debug!(%id, "Dropping reply for a request nobody is waiting on");
            return false;
        };
        // The receiver may have been dropped since; that's their business.
        tx.send(outcome).is_ok()
    }

    /// Stop waiting for `id`. Its caller (if still listening) sees a closed
    /// channel, and a later reply is dropped.
    pub fn abandon(&self, id: RequestId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Abandon every waiting request; returns how many there were.
    pub fn abandon_all(&self) -> usize {
        let mut waiting = self.lock();
        let count = waiting.len();
        waiting.clear();
        count
    }

    /// Number of requests still waiting for a reply.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<Outcome>>> {
        // Nothing panics while holding the lock, but a poisoned map is still
        // a valid map.
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
