use std::time::Duration;

/// Default byte capacity of each ring created at dial time.
///
/// A few dozen bytes is plenty for rendezvous-style test traffic; raise it
/// through [`ListenerConfig`] for bulk transfers.
pub const DEFAULT_RING_CAPACITY: usize = 64;

/// Default time a `dial` or `accept` call may stay blocked.
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a [`MemoryListener`](crate::MemoryListener).
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Maximum number of dialed connections that may sit in the accept
    /// queue at once. Values below 1 are normalised to 1.
    pub backlog: usize,
    /// How long `dial` (queue full) and `accept` (queue empty) may block
    /// before failing with [`FabricError::Timeout`](crate::FabricError::Timeout).
    pub accept_timeout: Duration,
    /// Byte capacity of each ring backing a dialed connection pair.
    pub ring_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            backlog: 1,
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
            ring_capacity: DEFAULT_RING_CAPACITY,
        }
    }
}

impl ListenerConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }
}
