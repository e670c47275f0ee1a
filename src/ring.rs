//! Bounded byte ring with suspending reads and writes.
//!
//! The ring is the transport primitive of the fabric: a fixed-capacity
//! circular byte buffer with one producer side and one consumer side.
//! Reads and writes suspend the calling task (never busy-wait) until one
//! of three things happens: progress becomes possible, the ring is closed,
//! or the direction's deadline elapses.
//!
//! ```text
//! writer task                     Ring                      reader task
//! ───────────                ─────────────                  ───────────
//! write(src) ── suspend ──► [ x x . . . x ] ── suspend ◄── read(dst)
//!               on full      read_pos ▲                     on empty
//!                            write_pos = (read_pos + len) % capacity
//! ```
//!
//! The supported usage mode is one reader task and one writer task per
//! ring; no fairness is offered beyond that.

use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant, Sleep};

use crate::error::{FabricError, FabricResult};

/// Fixed-capacity FIFO byte buffer with suspending read/write, a one-way
/// close protocol, and per-direction absolute deadlines.
///
/// Closing is terminal: once closed, no further bytes can be enqueued.
/// Reads drain whatever is still buffered and then fail with
/// [`FabricError::ClosedPipe`]; connection endpoints reinterpret that
/// drained condition as end of stream.
#[derive(Debug)]
pub struct Ring {
    capacity: usize,
    state: Mutex<RingState>,
}

#[derive(Debug)]
struct RingState {
    /// Backing storage; `capacity` bytes, never reallocated.
    buf: Box<[u8]>,
    /// Index of the oldest buffered byte.
    read_pos: usize,
    /// Number of buffered bytes, `0..=capacity`.
    len: usize,
    closed: bool,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
    /// Waiter for "data available or closed".
    read_waker: Option<Waker>,
    /// Waiter for "space available or closed".
    write_waker: Option<Waker>,
    /// Timer armed while a read is suspended with a deadline pending.
    /// Discarded whenever the deadline is re-set.
    read_timer: Option<Pin<Box<Sleep>>>,
    write_timer: Option<Pin<Box<Sleep>>>,
}

impl RingState {
    /// Copy up to `dst.len()` buffered bytes out, advancing the cursor.
    fn pop_into(&mut self, dst: &mut [u8]) -> usize {
        let capacity = self.buf.len();
        let n = self.len.min(dst.len());
        let first = n.min(capacity - self.read_pos);
        dst[..first].copy_from_slice(&self.buf[self.read_pos..self.read_pos + first]);
        if n > first {
            dst[first..n].copy_from_slice(&self.buf[..n - first]);
        }
        self.read_pos = (self.read_pos + n) % capacity;
        self.len -= n;
        n
    }

    /// Copy up to the free capacity in from `src`.
    fn push_from(&mut self, src: &[u8]) -> usize {
        let capacity = self.buf.len();
        let free = capacity - self.len;
        let n = free.min(src.len());
        let write_pos = (self.read_pos + self.len) % capacity;
        let first = n.min(capacity - write_pos);
        self.buf[write_pos..write_pos + first].copy_from_slice(&src[..first]);
        if n > first {
            self.buf[..n - first].copy_from_slice(&src[first..n]);
        }
        self.len += n;
        n
    }

    fn wake_reader(&mut self) {
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
    }

    fn wake_writer(&mut self) {
        if let Some(waker) = self.write_waker.take() {
            waker.wake();
        }
    }
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| d <= Instant::now())
}

impl Ring {
    /// Create a ring holding up to `capacity` bytes. Capacities below 1
    /// are normalised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(RingState {
                buf: vec![0u8; capacity].into_boxed_slice(),
                read_pos: 0,
                len: 0,
                closed: false,
                read_deadline: None,
                write_deadline: None,
                read_waker: None,
                write_waker: None,
                read_timer: None,
                write_timer: None,
            }),
        }
    }

    /// Byte capacity the ring was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    /// Whether the ring holds no buffered bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`close`](Ring::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Read buffered bytes into `dst`, suspending while the ring is empty
    /// and open.
    ///
    /// Returns the number of bytes copied (at most `dst.len()`, at least 1
    /// for a non-empty `dst`; short reads happen, and a second call picks
    /// up the rest). A zero-length `dst` never suspends: it returns `Ok(0)`
    /// on an open ring, but still observes a closed ring
    /// ([`FabricError::ClosedPipe`]) and an expired deadline
    /// ([`FabricError::Timeout`]).
    ///
    /// Once the ring is closed and drained, every read fails with
    /// [`FabricError::ClosedPipe`].
    pub async fn read(&self, dst: &mut [u8]) -> FabricResult<usize> {
        poll_fn(|cx| self.poll_read(cx, dst)).await
    }

    /// Write all of `src` into the ring, suspending as needed while space
    /// frees up.
    ///
    /// The full request is satisfied before returning: `src` may be larger
    /// than the ring's capacity, in which case the call enqueues chunks as
    /// the reader drains them. Fails with [`FabricError::ClosedPipe`] if
    /// the ring is (or becomes) closed, and with [`FabricError::Timeout`]
    /// if the write deadline elapses while suspended. A zero-length `src`
    /// never suspends but observes both conditions.
    pub async fn write(&self, src: &[u8]) -> FabricResult<usize> {
        let mut written = 0;
        loop {
            let n = poll_fn(|cx| self.poll_write_some(cx, &src[written..])).await?;
            written += n;
            if written >= src.len() {
                return Ok(written);
            }
        }
    }

    /// Close the ring. Idempotent.
    ///
    /// Buffered bytes remain readable; once drained, reads fail with
    /// [`FabricError::ClosedPipe`] and writes fail immediately. Both
    /// waiters are woken so suspended operations observe the closed state.
    pub fn close(&self) {
        let mut s = self.state.lock();
        if s.closed {
            return;
        }
        s.closed = true;
        s.wake_reader();
        s.wake_writer();
        tracing::trace!(buffered = s.len, capacity = self.capacity, "ring closed");
    }

    /// Set or clear the absolute deadline for reads. `None` means "never".
    ///
    /// A deadline already in the past makes every read, suspended or
    /// subsequently issued, fail with [`FabricError::Timeout`] until the
    /// deadline is cleared or extended. A suspended reader is woken so the
    /// new value takes effect promptly.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        let mut s = self.state.lock();
        s.read_deadline = deadline;
        s.read_timer = None;
        s.wake_reader();
    }

    /// Set or clear the absolute deadline for writes. `None` means "never".
    ///
    /// Same semantics as [`set_read_deadline`](Ring::set_read_deadline),
    /// for the write direction.
    pub fn set_write_deadline(&self, deadline: Option<Instant>) {
        let mut s = self.state.lock();
        s.write_deadline = deadline;
        s.write_timer = None;
        s.wake_writer();
    }

    /// Single read attempt: drain what is buffered or suspend.
    pub(crate) fn poll_read(&self, cx: &mut Context<'_>, dst: &mut [u8]) -> Poll<FabricResult<usize>> {
        let mut s = self.state.lock();
        if s.closed && s.len == 0 {
            return Poll::Ready(Err(FabricError::ClosedPipe));
        }
        if expired(s.read_deadline) {
            return Poll::Ready(Err(FabricError::Timeout));
        }
        if s.len > 0 && !dst.is_empty() {
            let n = s.pop_into(dst);
            s.wake_writer();
            return Poll::Ready(Ok(n));
        }
        if dst.is_empty() {
            return Poll::Ready(Ok(0));
        }
        // Empty and open: suspend until data arrives, the ring closes, or
        // the deadline fires. The waker is registered under the lock, so a
        // state change on the other side cannot slip between the check and
        // the registration.
        s.read_waker = Some(cx.waker().clone());
        if let Some(deadline) = s.read_deadline {
            let timer = s
                .read_timer
                .get_or_insert_with(|| Box::pin(sleep_until(deadline)));
            if timer.as_mut().poll(cx).is_ready() {
                s.read_timer = None;
                return Poll::Ready(Err(FabricError::Timeout));
            }
        }
        Poll::Pending
    }

    /// Single write attempt: enqueue into free capacity or suspend.
    /// Partial progress is reported; `Ring::write` loops over this.
    pub(crate) fn poll_write_some(
        &self,
        cx: &mut Context<'_>,
        src: &[u8],
    ) -> Poll<FabricResult<usize>> {
        let mut s = self.state.lock();
        if s.closed {
            return Poll::Ready(Err(FabricError::ClosedPipe));
        }
        if expired(s.write_deadline) {
            return Poll::Ready(Err(FabricError::Timeout));
        }
        if src.is_empty() {
            return Poll::Ready(Ok(0));
        }
        if s.len < self.capacity {
            let n = s.push_from(src);
            s.wake_reader();
            return Poll::Ready(Ok(n));
        }
        // Full and open: suspend until the reader frees space, the ring
        // closes, or the deadline fires.
        s.write_waker = Some(cx.waker().clone());
        if let Some(deadline) = s.write_deadline {
            let timer = s
                .write_timer
                .get_or_insert_with(|| Box::pin(sleep_until(deadline)));
            if timer.as_mut().poll(cx).is_ready() {
                s.write_timer = None;
                return Poll::Ready(Err(FabricError::Timeout));
            }
        }
        Poll::Pending
    }
}
