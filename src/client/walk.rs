//! Subtree walk stream.

#![allow(clippy::type_complexity)]

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use super::{Client, Target};
use crate::error::{Error, Result, WalkAbortReason};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::value::Value;
use crate::varbind::VarBind;

/// Request type used to advance a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WalkMode {
    /// One GETNEXT per binding (default; works with every agent).
    #[default]
    GetNext,
    /// GETBULK with the client's max-repetitions (v2c only).
    GetBulk,
}

/// How the walk reacts to an agent returning OIDs out of order.
///
/// A walk only terminates if OIDs keep increasing, so an agent that returns
/// an OID not greater than the previous one would otherwise loop forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OidOrdering {
    /// Abort with [`WalkAbortReason::NonIncreasing`] on the first OID not
    /// greater than the previous one (default).
    #[default]
    Strict,

    /// Tolerate out-of-order OIDs; abort with [`WalkAbortReason::Cycle`]
    /// only when an OID repeats.
    ///
    /// Remembers every OID seen, so pair it with
    /// [`ClientConfig::max_walk_results`](super::ClientConfig::max_walk_results).
    AllowNonIncreasing,
}

enum OidTracker {
    Strict { last: Oid },
    Relaxed { seen: HashSet<Oid> },
}

impl OidTracker {
    fn new(ordering: OidOrdering, root: &Oid) -> Self {
        match ordering {
            OidOrdering::Strict => OidTracker::Strict { last: root.clone() },
            OidOrdering::AllowNonIncreasing => OidTracker::Relaxed {
                seen: HashSet::new(),
            },
        }
    }

    fn check(&mut self, oid: &Oid) -> std::result::Result<(), WalkAbortReason> {
        match self {
            OidTracker::Strict { last } => {
                if oid <= last {
                    return Err(WalkAbortReason::NonIncreasing);
                }
                *last = oid.clone();
            }
            OidTracker::Relaxed { seen } => {
                if !seen.insert(oid.clone()) {
                    return Err(WalkAbortReason::Cycle);
                }
            }
        }
        Ok(())
    }
}

/// Lazy traversal of the subtree under a root OID.
///
/// Yields each binding strictly inside the subtree. Ends without error at
/// `endOfMibView` or at the first OID outside the subtree. Any error is
/// yielded once and ends the walk; bindings yielded before it stay valid.
///
/// Created by [`Client::walk`].
pub struct Walk<T: Transport> {
    client: Client<T>,
    target: Target,
    root: Oid,
    current: Oid,
    mode: WalkMode,
    max_repetitions: i32,
    tracker: OidTracker,
    max_results: Option<usize>,
    count: usize,
    done: bool,
    buffer: std::vec::IntoIter<VarBind>,
    pending: Option<Pin<Box<dyn Future<Output = Result<Vec<VarBind>>> + Send>>>,
}

impl<T: Transport> Walk<T> {
    pub(crate) fn new(
        client: Client<T>,
        target: Target,
        root: Oid,
        mode: WalkMode,
        ordering: OidOrdering,
        max_results: Option<usize>,
        max_repetitions: i32,
    ) -> Self {
        Self {
            client,
            target,
            tracker: OidTracker::new(ordering, &root),
            current: Self::seed(&root),
            root,
            mode,
            max_repetitions: max_repetitions.max(1),
            max_results,
            count: 0,
            done: false,
            buffer: Vec::new().into_iter(),
            pending: None,
        }
    }

    /// First OID sent for a walk of `root`.
    ///
    /// A single-arc OID has no BER encoding, so `1` is walked from `1.0`.
    pub(crate) fn seed(root: &Oid) -> Oid {
        if root.len() == 1 {
            root.child(0)
        } else {
            root.clone()
        }
    }

    /// The subtree root.
    pub fn root(&self) -> &Oid {
        &self.root
    }

    /// Number of bindings yielded so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Get the next binding, or `None` when the walk is over.
    pub async fn next(&mut self) -> Option<Result<VarBind>> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Collect all remaining bindings, failing on the first error.
    pub async fn collect(mut self) -> Result<Vec<VarBind>> {
        let mut results = Vec::new();
        while let Some(result) = self.next().await {
            results.push(result?);
        }
        Ok(results)
    }

    /// Classify one binding from the agent. `None` means the walk ended.
    fn accept(&mut self, vb: VarBind) -> Option<Result<VarBind>> {
        self.done = true;

        if matches!(vb.value, Value::EndOfMibView) {
            tracing::debug!(target: "snmp_manager::client", { snmp.count = self.count }, "walk reached end of MIB view");
            return None;
        }
        if !vb.oid.is_descendant_of(&self.root) {
            tracing::debug!(target: "snmp_manager::client", { snmp.count = self.count, snmp.oid = %vb.oid }, "walk left subtree");
            return None;
        }
        if let Err(reason) = self.tracker.check(&vb.oid) {
            tracing::warn!(target: "snmp_manager::client", { snmp.target = %self.target.addr(), snmp.previous = %self.current, snmp.oid = %vb.oid, %reason }, "walk aborted");
            return Some(Err(Error::WalkAborted {
                target: self.target.addr(),
                reason,
            }
            .boxed()));
        }

        self.done = false;
        self.current = vb.oid.clone();
        self.count += 1;
        Some(Ok(vb))
    }

    fn start_request(&mut self) {
        let client = self.client.clone();
        let target = self.target.clone();
        let oid = self.current.clone();

        let fut: Pin<Box<dyn Future<Output = Result<Vec<VarBind>>> + Send>> = match self.mode {
            WalkMode::GetNext => {
                Box::pin(async move { client.get_next(&target, std::slice::from_ref(&oid)).await })
            }
            WalkMode::GetBulk => {
                let max_repetitions = self.max_repetitions;
                Box::pin(async move {
                    client
                        .get_bulk(&target, std::slice::from_ref(&oid), 0, max_repetitions)
                        .await
                })
            }
        };
        self.pending = Some(fut);
    }
}

impl<T: Transport> Stream for Walk<T> {
    type Item = Result<VarBind>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }

            if let Some(max) = self.max_results
                && self.count >= max
            {
                tracing::debug!(target: "snmp_manager::client", { snmp.count = self.count }, "walk reached result limit");
                self.done = true;
                return Poll::Ready(None);
            }

            if let Some(vb) = self.buffer.next() {
                return Poll::Ready(self.accept(vb));
            }

            if self.pending.is_none() {
                self.start_request();
            }

            let Some(pending) = self.pending.as_mut() else {
                return Poll::Ready(None);
            };
            let result = match pending.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => result,
            };
            self.pending = None;

            match result {
                Ok(varbinds) if varbinds.is_empty() => {
                    self.done = true;
                    return Poll::Ready(None);
                }
                Ok(varbinds) => self.buffer = varbinds.into_iter(),
                Err(e) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}
