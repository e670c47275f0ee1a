//! Full-duplex in-memory connection endpoints.
//!
//! A [`MemoryStream`] is one end of a bidirectional byte stream built from
//! two [`Ring`]s, cross-wired so that one endpoint's outbound ring is the
//! other endpoint's inbound ring:
//!
//! ```text
//!  local endpoint                              remote endpoint
//!  ──────────────                              ───────────────
//!  write ────────►  Ring (local → remote)  ────────► read
//!  read  ◄────────  Ring (remote → local)  ◄──────── write
//! ```
//!
//! Each ring is jointly owned by both endpoints; it lives as long as the
//! longer-lived of the two. Closing either endpoint closes both rings, so
//! the peer drains whatever is still buffered and then observes end of
//! stream, while writes on both sides fail with
//! [`FabricError::ClosedPipe`]. Dropping an endpoint closes it, matching
//! what a real socket does.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

use crate::error::{FabricError, FabricResult};
use crate::ring::Ring;

/// One endpoint of an in-memory full-duplex connection.
///
/// Obtained from [`MemoryListener::dial`](crate::MemoryListener::dial) /
/// [`MemoryListener::accept`](crate::MemoryListener::accept), or directly
/// via [`MemoryStream::pair`]. Implements [`AsyncRead`] and
/// [`AsyncWrite`], so code written against a generic byte stream drives it
/// unchanged; the inherent [`read`](MemoryStream::read) and
/// [`write`](MemoryStream::write) methods expose the distinguishable
/// sentinels ([`FabricError::Eof`], [`FabricError::ClosedPipe`],
/// [`FabricError::Timeout`]) instead.
#[derive(Debug)]
pub struct MemoryStream {
    /// Reads consume from this ring.
    inbound: Arc<Ring>,
    /// Writes produce into this ring.
    outbound: Arc<Ring>,
    local_addr: String,
    peer_addr: String,
}

impl MemoryStream {
    pub(crate) fn new(
        inbound: Arc<Ring>,
        outbound: Arc<Ring>,
        local_addr: String,
        peer_addr: String,
    ) -> Self {
        Self {
            inbound,
            outbound,
            local_addr,
            peer_addr,
        }
    }

    /// Create a cross-wired endpoint pair sharing two rings of
    /// `ring_capacity` bytes each, both carrying `addr` as their address.
    pub fn pair(ring_capacity: usize, addr: &str) -> (MemoryStream, MemoryStream) {
        let a_to_b = Arc::new(Ring::new(ring_capacity));
        let b_to_a = Arc::new(Ring::new(ring_capacity));
        let a = MemoryStream::new(
            Arc::clone(&b_to_a),
            Arc::clone(&a_to_b),
            addr.to_string(),
            addr.to_string(),
        );
        let b = MemoryStream::new(a_to_b, b_to_a, addr.to_string(), addr.to_string());
        (a, b)
    }

    /// Read from the peer into `dst`, suspending while no data is
    /// buffered.
    ///
    /// Returns [`FabricError::Eof`] once the connection is closed and
    /// every buffered byte has been drained, and [`FabricError::Timeout`]
    /// when the read deadline elapses. A zero-length `dst` never suspends
    /// but still observes both conditions.
    pub async fn read(&self, dst: &mut [u8]) -> FabricResult<usize> {
        match self.inbound.read(dst).await {
            // A closed, drained inbound ring is this endpoint's end of
            // stream.
            Err(FabricError::ClosedPipe) => Err(FabricError::Eof),
            other => other,
        }
    }

    /// Write all of `src` towards the peer, suspending while the outbound
    /// ring is full.
    ///
    /// Fails with [`FabricError::ClosedPipe`] once either endpoint has
    /// closed, and with [`FabricError::Timeout`] when the write deadline
    /// elapses.
    pub async fn write(&self, src: &[u8]) -> FabricResult<usize> {
        self.outbound.write(src).await
    }

    /// Close the connection. Idempotent.
    ///
    /// Closes both underlying rings: writes fail on either side from here
    /// on, and the peer's reads drain the remaining bytes before
    /// reporting end of stream.
    pub fn close(&self) {
        self.inbound.close();
        self.outbound.close();
    }

    /// Address this endpoint was dialed or accepted with.
    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    /// Address of the peer endpoint.
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Apply `deadline` to both the read and the write direction.
    pub fn set_deadline(&self, deadline: Option<Instant>) {
        self.set_read_deadline(deadline);
        self.set_write_deadline(deadline);
    }

    /// Set or clear the absolute deadline for reads. `None` means "never".
    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.inbound.set_read_deadline(deadline);
    }

    /// Set or clear the absolute deadline for writes. `None` means
    /// "never".
    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        self.outbound.set_write_deadline(deadline);
    }
}

impl AsyncRead for MemoryStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let result = self.inbound.poll_read(cx, buf.initialize_unfilled());
        match result {
            Poll::Ready(Ok(n)) => {
                buf.advance(n);
                Poll::Ready(Ok(()))
            }
            // Graceful close reads as EOF on the generic surface.
            Poll::Ready(Err(FabricError::ClosedPipe)) => Poll::Ready(Ok(())),
            Poll::Ready(Err(err)) => Poll::Ready(Err(err.into())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncWrite for MemoryStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.outbound.poll_write_some(cx, buf) {
            Poll::Ready(Ok(n)) => Poll::Ready(Ok(n)),
            Poll::Ready(Err(err)) => Poll::Ready(Err(err.into())),
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Writes land in the peer-visible ring immediately; there is no
        // intermediate buffer to drain.
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.close();
        Poll::Ready(Ok(()))
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        // Dropping an endpoint always closes it, like a real socket.
        tracing::trace!(addr = %self.local_addr, "memory stream dropped, closing");
        self.close();
    }
}
