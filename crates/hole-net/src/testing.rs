//! In-process peers for backend tests.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;

use hole_protocol::{HoleCodec, HoleMessage, Server, PROTOCOL_VERSION};
use hole_store::{BackendResult, Block, Holeable, LocalBackend};
use hole_types::{Address, Network, Version};

pub fn test_network() -> Network {
    Network::new("test-net").unwrap()
}

async fn serve<B: Holeable + 'static>(backend: B) -> SocketAddr {
    backend.join().await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Server::new(test_network(), Arc::new(backend)).serve(listener));
    addr
}

/// Serve a joined `LocalBackend` rooted at `dir`.
pub async fn serve_local(dir: &Path) -> SocketAddr {
    serve(LocalBackend::new(dir, &test_network())).await
}

/// Local storage whose writes only land after `delay`.
struct SlowPuts {
    inner: LocalBackend,
    delay: Duration,
}

#[async_trait]
impl Holeable for SlowPuts {
    async fn join(&self) -> BackendResult<()> {
        self.inner.join().await
    }

    async fn leave(&self) -> BackendResult<()> {
        self.inner.leave().await
    }

    async fn put(&self, address: &Address, block: &Block) -> BackendResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.put(address, block).await
    }

    async fn get(&self, address: &Address, version: Option<Version>) -> BackendResult<Block> {
        self.inner.get(address, version).await
    }

    async fn kill(&self, address: &Address) -> BackendResult<()> {
        self.inner.kill(address).await
    }
}

/// Like [`serve_local`], but every put is held back for `delay`.
pub async fn serve_slow_puts(dir: &Path, delay: Duration) -> SocketAddr {
    serve(SlowPuts {
        inner: LocalBackend::new(dir, &test_network()),
        delay,
    })
    .await
}

/// A peer that completes the handshake and then answers every request with
/// `reply`, or never answers at all when `reply` is `None`.
pub async fn serve_scripted(reply: Option<HoleMessage>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let reply = reply.clone();
            tokio::spawn(async move {
                if !matches!(
                    HoleCodec::read(&mut stream).await,
                    Ok(Some(HoleMessage::Hello { .. }))
                ) {
                    return;
                }
                let ack = HoleMessage::HelloAck {
                    version: PROTOCOL_VERSION,
                };
                if HoleCodec::write(&mut stream, &ack).await.is_err() {
                    return;
                }
                while let Ok(Some(_)) = HoleCodec::read(&mut stream).await {
                    if let Some(reply) = &reply {
                        if HoleCodec::write(&mut stream, reply).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });
    addr
}

pub async fn serve_silent() -> SocketAddr {
    serve_scripted(None).await
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
