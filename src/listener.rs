//! Address-bound rendezvous pairing dialers with acceptors.

use std::collections::VecDeque;
use std::future::poll_fn;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::instrument;

use crate::config::ListenerConfig;
use crate::error::{FabricError, FabricResult};
use crate::stream::MemoryStream;

/// Rendezvous object bound to a logical address.
///
/// A dialer asks the listener for a new connection; the listener builds a
/// cross-wired [`MemoryStream`] pair, parks one half on a bounded FIFO
/// accept queue and hands the other half back. [`accept`] drains the
/// queue in the order the dials completed.
///
/// Both [`dial`] (queue full) and [`accept`] (queue empty) suspend the
/// calling task with three exits: progress, listener close
/// ([`FabricError::ClosedPipe`]) or the accept timeout
/// ([`FabricError::Timeout`]).
///
/// The listener is a clonable handle over shared state; clones observe
/// the same queue and closed flag.
///
/// [`dial`]: MemoryListener::dial
/// [`accept`]: MemoryListener::accept
#[derive(Debug, Clone)]
pub struct MemoryListener {
    inner: Arc<ListenerShared>,
}

#[derive(Debug)]
struct ListenerShared {
    addr: String,
    backlog: usize,
    accept_timeout: Duration,
    ring_capacity: usize,
    state: Mutex<ListenerState>,
}

#[derive(Debug)]
struct ListenerState {
    /// Connection halves awaiting `accept`, oldest first.
    queue: VecDeque<MemoryStream>,
    closed: bool,
    /// Acceptors waiting for a pending connection or close.
    accept_wakers: Vec<Waker>,
    /// Dialers waiting for queue space or close.
    dial_wakers: Vec<Waker>,
}

impl MemoryListener {
    /// Create a listener bound to `addr` with the given accept-queue
    /// `backlog` and `accept_timeout`, using the default per-ring
    /// capacity. Backlogs below 1 are normalised to 1.
    ///
    /// The address is opaque: it is never parsed, resolved, or bound to
    /// anything. It only has to match on [`addr`](MemoryListener::addr)
    /// and display.
    pub fn listen(backlog: usize, accept_timeout: Duration, addr: impl Into<String>) -> Self {
        Self::with_config(
            addr,
            ListenerConfig {
                backlog,
                accept_timeout,
                ..ListenerConfig::default()
            },
        )
    }

    /// Create a listener bound to `addr` from a full [`ListenerConfig`].
    pub fn with_config(addr: impl Into<String>, config: ListenerConfig) -> Self {
        let addr = addr.into();
        tracing::debug!(addr = %addr, backlog = config.backlog, "memory listener bound");
        Self {
            inner: Arc::new(ListenerShared {
                addr,
                backlog: config.backlog.max(1),
                accept_timeout: config.accept_timeout,
                ring_capacity: config.ring_capacity,
                state: Mutex::new(ListenerState {
                    queue: VecDeque::new(),
                    closed: false,
                    accept_wakers: Vec::new(),
                    dial_wakers: Vec::new(),
                }),
            }),
        }
    }

    /// Open a new connection through this listener.
    ///
    /// Builds a fresh ring pair, enqueues the remote half for
    /// [`accept`](MemoryListener::accept) and returns the local half.
    /// Fails with [`FabricError::ClosedPipe`] on a closed listener and
    /// with [`FabricError::Timeout`] if the accept queue stays full past
    /// the accept timeout.
    #[instrument(skip(self))]
    pub async fn dial(&self) -> FabricResult<MemoryStream> {
        match tokio::time::timeout(
            self.inner.accept_timeout,
            poll_fn(|cx| self.poll_dial(cx)),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FabricError::Timeout),
        }
    }

    /// Take the oldest pending connection, in dial-completion order.
    ///
    /// Fails with [`FabricError::ClosedPipe`] on a closed listener and
    /// with [`FabricError::Timeout`] if no dial arrives within the accept
    /// timeout.
    #[instrument(skip(self))]
    pub async fn accept(&self) -> FabricResult<MemoryStream> {
        match tokio::time::timeout(
            self.inner.accept_timeout,
            poll_fn(|cx| self.poll_accept(cx)),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FabricError::Timeout),
        }
    }

    /// Close the listener. Idempotent.
    ///
    /// Wakes every suspended dialer and acceptor and discards the pending
    /// connections still on the accept queue; discarding closes them, so
    /// their dialer-held peers observe end of stream. Connections already
    /// handed out keep working until their owners close them.
    pub fn close(&self) {
        let discarded = {
            let mut s = self.inner.state.lock();
            if s.closed {
                return;
            }
            s.closed = true;
            for waker in s.accept_wakers.drain(..) {
                waker.wake();
            }
            for waker in s.dial_wakers.drain(..) {
                waker.wake();
            }
            std::mem::take(&mut s.queue)
        };
        tracing::debug!(
            addr = %self.inner.addr,
            discarded = discarded.len(),
            "memory listener closed"
        );
        drop(discarded);
    }

    /// The exact address string this listener was bound with.
    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    /// Whether [`close`](MemoryListener::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    fn poll_dial(&self, cx: &mut Context<'_>) -> Poll<FabricResult<MemoryStream>> {
        let mut s = self.inner.state.lock();
        if s.closed {
            return Poll::Ready(Err(FabricError::ClosedPipe));
        }
        if s.queue.len() < self.inner.backlog {
            let (local, remote) = MemoryStream::pair(self.inner.ring_capacity, &self.inner.addr);
            s.queue.push_back(remote);
            for waker in s.accept_wakers.drain(..) {
                waker.wake();
            }
            tracing::trace!(addr = %self.inner.addr, pending = s.queue.len(), "dial enqueued");
            return Poll::Ready(Ok(local));
        }
        s.dial_wakers.push(cx.waker().clone());
        Poll::Pending
    }

    fn poll_accept(&self, cx: &mut Context<'_>) -> Poll<FabricResult<MemoryStream>> {
        let mut s = self.inner.state.lock();
        if let Some(stream) = s.queue.pop_front() {
            for waker in s.dial_wakers.drain(..) {
                waker.wake();
            }
            tracing::trace!(addr = %self.inner.addr, pending = s.queue.len(), "connection accepted");
            return Poll::Ready(Ok(stream));
        }
        if s.closed {
            return Poll::Ready(Err(FabricError::ClosedPipe));
        }
        s.accept_wakers.push(cx.waker().clone());
        Poll::Pending
    }
}
