use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use hole_store::Holeable;
use hole_types::Network;

use crate::codec::HoleCodec;
use crate::error::ProtocolResult;
use crate::message::{codes, HoleMessage, RemoteFailure, PROTOCOL_VERSION};

/// Serves a [`Holeable`] backend to remote peers over TCP.
///
/// Each accepted connection gets its own task. A connection must open with a
/// `Hello` for the served network; requests for any other network are
/// refused.
pub struct Server<B> {
    network: Network,
    backend: Arc<B>,
}

impl<B: Holeable + 'static> Server<B> {
    pub fn new(network: Network, backend: Arc<B>) -> Self {
        Self { network, backend }
    }

    /// Accept connections until the task is dropped or an accept fails.
    pub async fn serve(self, listener: TcpListener) -> ProtocolResult<()> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> ProtocolResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(addr = %listener.local_addr()?, network = %self.network, "block server listening");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("block server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    let network = self.network.clone();
                    let backend = Arc::clone(&self.backend);
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, peer, network, backend).await {
                            warn!(%peer, %err, "connection ended with error");
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection<B: Holeable>(
    mut stream: TcpStream,
    peer: SocketAddr,
    network: Network,
    backend: Arc<B>,
) -> ProtocolResult<()> {
    let Some(first) = HoleCodec::read(&mut stream).await? else {
        return Ok(());
    };
    let refusal = match first {
        HoleMessage::Hello { version, .. } if version != PROTOCOL_VERSION => Some(
            RemoteFailure::rejected(codes::UNSUPPORTED_VERSION, format!("protocol version {version}")),
        ),
        HoleMessage::Hello { network: ref asked, .. } if asked != network.name() => Some(
            RemoteFailure::rejected(codes::WRONG_NETWORK, format!("network '{asked}' is not served here")),
        ),
        HoleMessage::Hello { .. } => None,
        other => Some(RemoteFailure::rejected(
            codes::BAD_REQUEST,
            format!("expected Hello, got {}", other.type_name()),
        )),
    };
    if let Some(failure) = refusal {
        warn!(%peer, ?failure, "handshake refused");
        HoleCodec::write(&mut stream, &HoleMessage::Error(failure)).await?;
        return Ok(());
    }
    HoleCodec::write(&mut stream, &HoleMessage::HelloAck { version: PROTOCOL_VERSION }).await?;
    debug!(%peer, "peer connected");

    while let Some(request) = HoleCodec::read(&mut stream).await? {
        let response = dispatch(backend.as_ref(), request).await;
        HoleCodec::write(&mut stream, &response).await?;
    }
    debug!(%peer, "peer disconnected");
    Ok(())
}

async fn dispatch<B: Holeable + ?Sized>(backend: &B, request: HoleMessage) -> HoleMessage {
    let result = match request {
        HoleMessage::Put { address, block } => backend
            .put(&address, &block)
            .await
            .map(|()| HoleMessage::Ack),
        HoleMessage::Get { address, version } => backend
            .get(&address, version)
            .await
            .map(|block| HoleMessage::Block { block }),
        HoleMessage::Kill { address } => backend.kill(&address).await.map(|()| HoleMessage::Ack),
        other => {
            return HoleMessage::Error(RemoteFailure::rejected(
                codes::BAD_REQUEST,
                format!("unexpected {}", other.type_name()),
            ))
        }
    };
    result.unwrap_or_else(|err| {
        debug!(%err, "request failed");
        HoleMessage::Error(RemoteFailure::from_backend(&err))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::error::ProtocolError;
    use hole_store::{Block, ImmutableBlock, LocalBackend};
    use hole_types::Component;

    async fn start(dir: &std::path::Path) -> SocketAddr {
        let network = Network::new("served").unwrap();
        let backend = Arc::new(LocalBackend::new(dir, &network));
        backend.join().await.unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(Server::new(network, backend).serve(listener));
        addr
    }

    #[tokio::test]
    async fn serves_put_get_kill() {
        let dir = tempfile::tempdir().unwrap();
        let addr = start(dir.path()).await;
        let mut channel = Channel::connect(addr, &Network::new("served").unwrap())
            .await
            .unwrap();

        let ib = ImmutableBlock::new(Component::Data, b"over the wire".to_vec());
        let address = ib.address();
        let block = Block::from(ib);

        let put = HoleMessage::Put { address, block: block.clone() };
        assert_eq!(channel.call(&put).await.unwrap(), HoleMessage::Ack);

        let get = HoleMessage::Get { address, version: None };
        assert_eq!(
            channel.call(&get).await.unwrap(),
            HoleMessage::Block { block }
        );

        let kill = HoleMessage::Kill { address };
        assert_eq!(channel.call(&kill).await.unwrap(), HoleMessage::Ack);
        assert_eq!(
            channel.call(&get).await.unwrap(),
            HoleMessage::Error(RemoteFailure::NotFound)
        );
    }

    #[tokio::test]
    async fn refuses_other_networks() {
        let dir = tempfile::tempdir().unwrap();
        let addr = start(dir.path()).await;
        let err = Channel::connect(addr, &Network::new("elsewhere").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::RemoteError { code: codes::WRONG_NETWORK, .. }
        ));
    }

    #[tokio::test]
    async fn rejects_responses_sent_as_requests() {
        let dir = tempfile::tempdir().unwrap();
        let addr = start(dir.path()).await;
        let mut channel = Channel::connect(addr, &Network::new("served").unwrap())
            .await
            .unwrap();
        let reply = channel.call(&HoleMessage::Ack).await.unwrap();
        assert!(matches!(
            reply,
            HoleMessage::Error(RemoteFailure::Rejected { code: codes::BAD_REQUEST, .. })
        ));
    }

    #[tokio::test]
    async fn shutdown_stops_accepting() {
        let dir = tempfile::tempdir().unwrap();
        let network = Network::new("served").unwrap();
        let backend = Arc::new(LocalBackend::new(dir.path(), &network));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(Server::new(network, backend).serve_with_shutdown(
            listener,
            async {
                let _ = rx.await;
            },
        ));
        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
