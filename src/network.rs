//! Provider abstraction and the in-memory address registry.
//!
//! Service wiring depends on these traits rather than on concrete
//! networking, so the same code can run against the in-memory fabric in
//! tests and against whatever real transport the host application brings.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::instrument;

use crate::config::ListenerConfig;
use crate::error::{FabricError, FabricResult};
use crate::listener::MemoryListener;
use crate::stream::MemoryStream;

/// Provider trait for creating connections and listeners.
///
/// `Clone` allows sharing a provider across multiple components cheaply.
#[async_trait]
pub trait NetworkProvider: Clone {
    /// The byte-stream type this provider produces.
    type Stream: AsyncRead + AsyncWrite + Unpin + 'static;
    /// The listener type this provider produces.
    type Listener: StreamListener<Stream = Self::Stream> + 'static;

    /// Create a listener bound to the given address.
    async fn bind(&self, addr: &str) -> io::Result<Self::Listener>;

    /// Connect to a listener bound at `addr`.
    async fn connect(&self, addr: &str) -> io::Result<Self::Stream>;
}

/// Trait for listeners that can accept connections.
#[async_trait]
pub trait StreamListener {
    /// The byte-stream type this listener produces.
    type Stream: AsyncRead + AsyncWrite + Unpin + 'static;

    /// Accept a single incoming connection, returning it together with
    /// the peer address.
    async fn accept(&self) -> io::Result<(Self::Stream, String)>;

    /// The address this listener is bound to.
    fn local_addr(&self) -> io::Result<String>;
}

#[async_trait]
impl StreamListener for MemoryListener {
    type Stream = MemoryStream;

    async fn accept(&self) -> io::Result<(Self::Stream, String)> {
        let stream = MemoryListener::accept(self).await?;
        let peer = stream.peer_addr().to_string();
        Ok((stream, peer))
    }

    fn local_addr(&self) -> io::Result<String> {
        Ok(self.addr().to_string())
    }
}

/// In-memory network: an address registry mapping opaque address strings
/// to live [`MemoryListener`]s.
///
/// Addresses are compared by string equality only; nothing is parsed,
/// resolved, or bound to an interface. Binding an address carrying a live
/// listener fails with [`FabricError::AddrInUse`]; connecting to an
/// unbound or closed address fails with
/// [`FabricError::ConnectionRefused`]. A closed listener's address can be
/// re-bound.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    config: ListenerConfig,
    listeners: Arc<Mutex<HashMap<String, MemoryListener>>>,
}

impl MemoryNetwork {
    /// Create a registry whose listeners use the default
    /// [`ListenerConfig`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry whose listeners use `config`.
    pub fn with_config(config: ListenerConfig) -> Self {
        Self {
            config,
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bind a new listener at `addr`.
    #[instrument(skip(self))]
    pub fn bind(&self, addr: &str) -> FabricResult<MemoryListener> {
        let mut registry = self.listeners.lock();
        if let Some(existing) = registry.get(addr) {
            if !existing.is_closed() {
                return Err(FabricError::AddrInUse {
                    addr: addr.to_string(),
                });
            }
        }
        let listener = MemoryListener::with_config(addr, self.config.clone());
        registry.insert(addr.to_string(), listener.clone());
        Ok(listener)
    }

    /// Dial the listener bound at `addr`.
    #[instrument(skip(self))]
    pub async fn connect(&self, addr: &str) -> FabricResult<MemoryStream> {
        let listener = {
            let registry = self.listeners.lock();
            match registry.get(addr) {
                Some(listener) if !listener.is_closed() => listener.clone(),
                _ => {
                    return Err(FabricError::ConnectionRefused {
                        addr: addr.to_string(),
                    });
                }
            }
        };
        listener.dial().await.map_err(|err| match err {
            // The listener closed between lookup and dial.
            FabricError::ClosedPipe => FabricError::ConnectionRefused {
                addr: addr.to_string(),
            },
            other => other,
        })
    }
}

#[async_trait]
impl NetworkProvider for MemoryNetwork {
    type Stream = MemoryStream;
    type Listener = MemoryListener;

    async fn bind(&self, addr: &str) -> io::Result<Self::Listener> {
        Ok(MemoryNetwork::bind(self, addr)?)
    }

    async fn connect(&self, addr: &str) -> io::Result<Self::Stream> {
        Ok(MemoryNetwork::connect(self, addr).await?)
    }
}
