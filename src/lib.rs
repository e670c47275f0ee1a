//! # memfabric
//!
//! An in-process network fabric: pairs of bidirectional byte-stream
//! endpoints that satisfy the contract of a kernel stream socket
//! (listen/dial/accept, suspending read/write, close propagation,
//! deadlines) while transporting every byte through user-space ring
//! buffers. Nothing here touches a network interface, a port, or DNS,
//! which makes the fabric a drop-in substrate for test harnesses,
//! simulators, and service wiring that want to exercise
//! connection-oriented code paths hermetically.
//!
//! ## Layering
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  NetworkProvider / StreamListener      (trait seam)  │
//! │  MemoryNetwork: addr string → listener  (registry)   │
//! ├──────────────────────────────────────────────────────┤
//! │  MemoryListener: bounded FIFO accept queue, dial ↔   │
//! │  accept rendezvous with timeout                      │
//! ├──────────────────────────────────────────────────────┤
//! │  MemoryStream: two Rings, cross-wired, full duplex   │
//! ├──────────────────────────────────────────────────────┤
//! │  Ring: bounded byte FIFO, suspending read/write,     │
//! │  close protocol, per-direction deadlines             │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sentinels
//!
//! Every blocked operation exits with progress or exactly one of three
//! distinguishable errors:
//!
//! | Sentinel | Meaning |
//! |----------|---------|
//! | [`FabricError::Eof`] | peer closed, buffered bytes fully drained |
//! | [`FabricError::ClosedPipe`] | operation against a closed ring/listener in a direction that no longer admits it |
//! | [`FabricError::Timeout`] | deadline elapsed; state unchanged, retry after clearing it |
//!
//! On the [`AsyncRead`](tokio::io::AsyncRead) /
//! [`AsyncWrite`](tokio::io::AsyncWrite) surface these map to a 0-byte
//! read, [`BrokenPipe`](std::io::ErrorKind::BrokenPipe) and
//! [`TimedOut`](std::io::ErrorKind::TimedOut) respectively.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use memfabric::MemoryListener;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), memfabric::FabricError> {
//! let listener = MemoryListener::listen(1, Duration::from_millis(10), "0.0.0.0:4434");
//! let local = listener.dial().await?;
//! let remote = listener.accept().await?;
//!
//! local.write(b"shared").await?;
//! let mut buf = [0u8; 6];
//! let n = remote.read(&mut buf).await?;
//! assert_eq!(&buf[..n], b"shared");
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// Listener and ring configuration.
pub mod config;
/// Error types and sentinel taxonomy.
pub mod error;
/// The listener/dialer rendezvous.
pub mod listener;
/// Provider traits and the in-memory address registry.
pub mod network;
/// The bounded byte ring transport primitive.
pub mod ring;
/// Full-duplex connection endpoints.
pub mod stream;

pub use config::{ListenerConfig, DEFAULT_ACCEPT_TIMEOUT, DEFAULT_RING_CAPACITY};
pub use error::{FabricError, FabricResult};
pub use listener::MemoryListener;
pub use network::{MemoryNetwork, NetworkProvider, StreamListener};
pub use ring::Ring;
pub use stream::MemoryStream;
