//! Pending-request table.
//!
//! Maps in-flight request-ids to the oneshot sender of the caller waiting
//! for the reply. The dispatcher task completes entries; callers remove
//! their own entry when they stop waiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::oneshot;

/// A raw reply and the address it came from.
pub(crate) type Reply = (Bytes, SocketAddr);

pub(crate) struct PendingTable {
    state: Mutex<State>,
    next_id: AtomicI32,
}

struct State {
    waiters: HashMap<i32, oneshot::Sender<Reply>>,
    closed: bool,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::starting_at(initial_request_id())
    }

    pub(crate) fn starting_at(first_id: i32) -> Self {
        Self {
            state: Mutex::new(State {
                waiters: HashMap::new(),
                closed: false,
            }),
            next_id: AtomicI32::new(first_id.max(1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a request-id and register a waiter for it.
    ///
    /// Ids run 1..=i32::MAX and wrap; an id still pending is skipped.
    /// Returns `None` once the table is closed.
    pub(crate) fn register(self: &Arc<Self>) -> Option<PendingRequest> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        if state.closed {
            return None;
        }

        let id = loop {
            let id = self.advance();
            if !state.waiters.contains_key(&id) {
                break id;
            }
        };
        state.waiters.insert(id, tx);

        Some(PendingRequest {
            table: Arc::clone(self),
            id,
            rx,
        })
    }

    fn advance(&self) -> i32 {
        let step = |id: i32| Some(if id >= i32::MAX { 1 } else { id + 1 });
        match self.next_id.fetch_update(Ordering::Relaxed, Ordering::Relaxed, step) {
            Ok(id) | Err(id) => id,
        }
    }

    /// Hand a reply to the waiter for `id`. Returns false when nobody waits.
    pub(crate) fn complete(&self, id: i32, reply: Reply) -> bool {
        let waiter = self.lock().waiters.remove(&id);
        match waiter {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    fn remove(&self, id: i32) {
        self.lock().waiters.remove(&id);
    }

    /// Refuse new registrations and fail every current waiter.
    ///
    /// Returns the number of waiters dropped.
    pub(crate) fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;
        let drained = state.waiters.len();
        state.waiters.clear();
        drained
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().waiters.len()
    }
}

/// Registration of one in-flight request.
///
/// Dropping it retires the request-id, so a reply arriving afterwards is
/// treated as unmatched.
pub(crate) struct PendingRequest {
    table: Arc<PendingTable>,
    id: i32,
    rx: oneshot::Receiver<Reply>,
}

impl PendingRequest {
    pub(crate) fn id(&self) -> i32 {
        self.id
    }

    /// Receiver for the reply. Fails when the table is closed.
    pub(crate) fn receiver(&mut self) -> &mut oneshot::Receiver<Reply> {
        &mut self.rx
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.table.remove(self.id);
    }
}

/// Clock-derived starting id, so a restarted manager does not reuse the ids
/// of its previous incarnation.
fn initial_request_id() -> i32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as i32 ^ (d.as_secs() as i32))
        .unwrap_or(1);
    nanos.wrapping_abs().max(1)
}
