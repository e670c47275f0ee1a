//! End-to-end tests for the fabric: dial/accept rendezvous, full-duplex
//! transfer, close propagation, and the provider seam.

use std::time::Duration;

use memfabric::{
    FabricError, ListenerConfig, MemoryListener, MemoryNetwork, NetworkProvider, StreamListener,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const ADDR: &str = "0.0.0.0:4434";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

fn listen_default() -> MemoryListener {
    init_tracing();
    MemoryListener::listen(1, Duration::from_millis(10), ADDR)
}

/// Dial and accept one pair through a fresh listener.
async fn serve_pair() -> (MemoryListener, memfabric::MemoryStream, memfabric::MemoryStream) {
    let listener = listen_default();
    let local = listener.dial().await.expect("failed to connect to memory listener");
    let remote = listener.accept().await.expect("failed to accept memory connection");
    (listener, local, remote)
}

#[tokio::test]
async fn test_listener_addr_round_trip() {
    let listener = listen_default();
    assert_eq!(listener.addr(), ADDR);
    assert_eq!(
        StreamListener::local_addr(&listener).expect("local_addr"),
        ADDR
    );
}

#[tokio::test]
async fn test_closed_listener_rejects_dial() {
    let listener = listen_default();
    listener.close();
    assert!(matches!(
        listener.dial().await,
        Err(FabricError::ClosedPipe)
    ));
}

#[tokio::test]
async fn test_closed_listener_rejects_accept() {
    let listener = listen_default();
    listener.close();
    assert!(matches!(
        listener.accept().await,
        Err(FabricError::ClosedPipe)
    ));
}

#[tokio::test]
async fn test_listener_close_is_idempotent() {
    let listener = listen_default();
    listener.close();
    listener.close();
    assert!(listener.is_closed());
}

#[tokio::test]
async fn test_conn_read_write() {
    let (_listener, local, remote) = serve_pair().await;

    let input = b"shared";
    let written = local.write(input).await.expect("could not write in local memory conn");

    let mut output = [0u8; 6];
    let read = remote.read(&mut output).await.expect("could not read from remote memory conn");

    assert_eq!(written, read);
    assert_eq!(&output, input);
}

#[tokio::test]
async fn test_local_closed_read() {
    let (_listener, local, remote) = serve_pair().await;
    local.close();
    assert_eq!(remote.read(&mut []).await, Err(FabricError::Eof));
}

#[tokio::test]
async fn test_local_closed_write() {
    let (_listener, local, remote) = serve_pair().await;
    local.close();
    assert_eq!(remote.write(&[]).await, Err(FabricError::ClosedPipe));
}

#[tokio::test]
async fn test_remote_closed_read() {
    let (_listener, local, remote) = serve_pair().await;
    remote.close();
    assert_eq!(local.read(&mut []).await, Err(FabricError::Eof));
}

#[tokio::test]
async fn test_remote_closed_write() {
    let (_listener, local, remote) = serve_pair().await;
    remote.close();
    assert_eq!(local.write(&[]).await, Err(FabricError::ClosedPipe));
}

#[tokio::test]
async fn test_close_drains_before_eof() {
    let (_listener, local, remote) = serve_pair().await;
    local.write(b"last words").await.expect("write");
    local.close();

    // Buffered bytes survive the close; only then comes end of stream.
    let mut buf = [0u8; 32];
    let n = remote.read(&mut buf).await.expect("drain");
    assert_eq!(&buf[..n], b"last words");
    assert_eq!(remote.read(&mut buf).await, Err(FabricError::Eof));
}

#[tokio::test]
async fn test_conn_close_is_idempotent() {
    let (_listener, local, remote) = serve_pair().await;
    local.close();
    local.close();
    assert_eq!(remote.read(&mut []).await, Err(FabricError::Eof));
}

#[tokio::test]
async fn test_addresses_are_positional() {
    let (_listener, local, remote) = serve_pair().await;
    assert_eq!(local.local_addr(), ADDR);
    assert_eq!(local.peer_addr(), ADDR);
    assert_eq!(remote.local_addr(), ADDR);
    assert_eq!(remote.peer_addr(), ADDR);
}

#[tokio::test]
async fn test_accept_returns_dials_in_order() {
    let listener = MemoryListener::listen(3, Duration::from_millis(10), ADDR);

    let mut dialed = Vec::new();
    for marker in 1..=3u8 {
        let local = listener.dial().await.expect("dial");
        local.write(&[marker]).await.expect("write marker");
        dialed.push(local);
    }

    for expected in 1..=3u8 {
        let remote = listener.accept().await.expect("accept");
        let mut buf = [0u8; 1];
        remote.read(&mut buf).await.expect("read marker");
        assert_eq!(buf[0], expected, "accept order diverged from dial order");
    }
}

#[tokio::test(start_paused = true)]
async fn test_dial_times_out_when_backlog_is_full() {
    let listener = listen_default();
    let _pending = listener.dial().await.expect("first dial");
    assert!(matches!(listener.dial().await, Err(FabricError::Timeout)));
}

#[tokio::test(start_paused = true)]
async fn test_accept_times_out_when_queue_is_empty() {
    let listener = listen_default();
    assert!(matches!(listener.accept().await, Err(FabricError::Timeout)));
}

#[tokio::test]
async fn test_accept_unblocks_pending_dial() {
    let listener = MemoryListener::listen(1, Duration::from_secs(1), ADDR);
    let _first = listener.dial().await.expect("first dial");

    let blocked = {
        let listener = listener.clone();
        tokio::spawn(async move { listener.dial().await })
    };
    tokio::task::yield_now().await;

    // Draining one slot must wake the suspended dialer.
    let _accepted = listener.accept().await.expect("accept");
    blocked
        .await
        .expect("join")
        .expect("second dial should complete after accept");
}

#[tokio::test]
async fn test_listener_close_discards_pending_connections() {
    let listener = listen_default();
    let local = listener.dial().await.expect("dial");
    listener.close();

    // The queued remote half was discarded, which closes the pair: the
    // dialer observes end of stream and a dead write direction.
    assert_eq!(local.read(&mut []).await, Err(FabricError::Eof));
    assert_eq!(local.write(b"x").await, Err(FabricError::ClosedPipe));
}

#[tokio::test]
async fn test_handed_out_connections_survive_listener_close() {
    let (listener, local, remote) = serve_pair().await;
    listener.close();

    local.write(b"still alive").await.expect("write");
    let mut buf = [0u8; 16];
    let n = remote.read(&mut buf).await.expect("read");
    assert_eq!(&buf[..n], b"still alive");
}

#[tokio::test]
async fn test_drop_closes_connection() {
    let (_listener, local, remote) = serve_pair().await;
    drop(local);
    assert_eq!(remote.read(&mut []).await, Err(FabricError::Eof));
    assert_eq!(remote.write(&[]).await, Err(FabricError::ClosedPipe));
}

#[tokio::test]
async fn test_registry_bind_conflicts_and_refusals() {
    let net = MemoryNetwork::new();
    let listener = net.bind(ADDR).expect("bind");

    assert!(matches!(
        net.bind(ADDR),
        Err(FabricError::AddrInUse { .. })
    ));
    assert!(matches!(
        net.connect("10.1.1.1:9999").await,
        Err(FabricError::ConnectionRefused { .. })
    ));

    // Closing the listener frees the address for re-binding and refuses
    // new connects in the meantime.
    listener.close();
    assert!(matches!(
        net.connect(ADDR).await,
        Err(FabricError::ConnectionRefused { .. })
    ));
    net.bind(ADDR).expect("re-bind after close");
}

#[tokio::test]
async fn test_registry_connect_reaches_listener() {
    let net = MemoryNetwork::with_config(ListenerConfig {
        backlog: 2,
        accept_timeout: Duration::from_secs(1),
        ring_capacity: 32,
    });
    let listener = net.bind("10.0.0.1:4434").expect("bind");

    let client = net.connect("10.0.0.1:4434").await.expect("connect");
    let server = listener.accept().await.expect("accept");

    client.write(b"ping").await.expect("write");
    let mut buf = [0u8; 4];
    server.read(&mut buf).await.expect("read");
    assert_eq!(&buf, b"ping");
}

/// Drives the fabric purely through the provider traits and the generic
/// `AsyncRead`/`AsyncWrite` surface, the way service wiring would.
async fn echo_once<P: NetworkProvider>(net: P, addr: &str) -> std::io::Result<Vec<u8>> {
    let listener = net.bind(addr).await?;
    let mut client = net.connect(addr).await?;
    let (mut server, peer) = listener.accept().await?;
    assert_eq!(peer, addr);

    client.write_all(b"ping").await?;
    let mut buf = [0u8; 4];
    server.read_exact(&mut buf).await?;
    server.write_all(&buf).await?;
    server.shutdown().await?;
    drop(server);

    let mut echoed = Vec::new();
    client.read_to_end(&mut echoed).await?;
    Ok(echoed)
}

#[tokio::test]
async fn test_generic_stream_interface_echo() {
    let echoed = echo_once(MemoryNetwork::new(), "10.0.0.2:7000")
        .await
        .expect("echo through generic interface");
    assert_eq!(echoed, b"ping");
}
