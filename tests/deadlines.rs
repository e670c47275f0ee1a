//! Deadline behavior on connection endpoints, run under tokio's paused
//! clock so expiry is deterministic and instant.

use std::time::Duration;

use memfabric::{FabricError, MemoryListener, MemoryStream};
use tokio::time::Instant;

const ADDR: &str = "0.0.0.0:4434";

async fn serve_pair() -> (MemoryListener, MemoryStream, MemoryStream) {
    let listener = MemoryListener::listen(1, Duration::from_millis(10), ADDR);
    let local = listener.dial().await.expect("failed to connect to memory listener");
    let remote = listener.accept().await.expect("failed to accept memory connection");
    (listener, local, remote)
}

#[tokio::test(start_paused = true)]
async fn test_remote_read_deadline_in_past() {
    let (_listener, _local, remote) = serve_pair().await;

    remote.set_read_deadline(Some(Instant::now()));
    tokio::time::advance(Duration::from_millis(1)).await;

    assert_eq!(remote.read(&mut []).await, Err(FabricError::Timeout));
}

#[tokio::test(start_paused = true)]
async fn test_local_read_deadline_in_past() {
    let (_listener, local, _remote) = serve_pair().await;

    local.set_read_deadline(Some(Instant::now()));
    tokio::time::advance(Duration::from_millis(1)).await;

    assert_eq!(local.read(&mut []).await, Err(FabricError::Timeout));
}

#[tokio::test(start_paused = true)]
async fn test_read_deadline_fires_while_suspended() {
    let (_listener, _local, remote) = serve_pair().await;

    remote.set_read_deadline(Some(Instant::now() + Duration::from_millis(250)));
    let mut buf = [0u8; 8];
    let start = Instant::now();
    assert_eq!(remote.read(&mut buf).await, Err(FabricError::Timeout));
    assert!(start.elapsed() >= Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_cleared_deadline_allows_retry() {
    let (_listener, local, remote) = serve_pair().await;

    remote.set_read_deadline(Some(Instant::now()));
    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(remote.read(&mut []).await, Err(FabricError::Timeout));

    // Clearing the deadline makes the endpoint usable again; no bytes
    // were consumed by the timed-out attempts.
    remote.set_read_deadline(None);
    local.write(b"late").await.expect("write");
    let mut buf = [0u8; 4];
    assert_eq!(remote.read(&mut buf).await.expect("read"), 4);
    assert_eq!(&buf, b"late");
}

#[tokio::test(start_paused = true)]
async fn test_set_deadline_covers_both_directions() {
    let (_listener, local, remote) = serve_pair().await;

    local.set_deadline(Some(Instant::now()));
    tokio::time::advance(Duration::from_millis(1)).await;

    assert_eq!(local.read(&mut []).await, Err(FabricError::Timeout));
    assert_eq!(local.write(b"x").await, Err(FabricError::Timeout));

    // The peer is unaffected.
    remote.write(b"y").await.expect("peer write");
}

#[tokio::test(start_paused = true)]
async fn test_write_deadline_fires_on_full_ring() {
    let (_listener, local, _remote) = serve_pair().await;

    // Saturate the outbound ring, then ask for more than fits.
    let filler = vec![0u8; 64];
    local.write(&filler).await.expect("fill");
    local.set_write_deadline(Some(Instant::now() + Duration::from_millis(50)));
    assert_eq!(local.write(b"overflow").await, Err(FabricError::Timeout));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_extension_takes_effect_while_suspended() {
    let (_listener, local, remote) = serve_pair().await;

    remote.set_read_deadline(Some(Instant::now() + Duration::from_secs(60)));
    let reader = tokio::spawn(async move {
        let mut buf = [0u8; 4];
        let n = remote.read(&mut buf).await?;
        Ok::<_, FabricError>((n, buf))
    });
    tokio::task::yield_now().await;

    // The reader is suspended against a 60s deadline; data arriving well
    // before it must complete the read, not the timer.
    local.write(b"data").await.expect("write");
    let (n, buf) = reader.await.expect("join").expect("read");
    assert_eq!(n, 4);
    assert_eq!(&buf, b"data");
}
