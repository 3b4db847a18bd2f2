use std::net::SocketAddr;

use tokio::net::TcpStream;
use tracing::debug;

use hole_types::Network;

use crate::codec::HoleCodec;
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{HoleMessage, PROTOCOL_VERSION};

/// Client end of a connection to a block server.
///
/// Requests and responses strictly alternate, so a channel serves one
/// request at a time; callers serialize access (`&mut self`).
#[derive(Debug)]
pub struct Channel {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Channel {
    /// Connect to `peer` and perform the handshake for `network`.
    pub async fn connect(peer: SocketAddr, network: &Network) -> ProtocolResult<Self> {
        let stream = TcpStream::connect(peer).await?;
        stream.set_nodelay(true)?;
        let mut channel = Self { stream, peer };
        channel.handshake(network).await?;
        debug!(%peer, %network, "channel established");
        Ok(channel)
    }

    async fn handshake(&mut self, network: &Network) -> ProtocolResult<()> {
        let hello = HoleMessage::Hello {
            version: PROTOCOL_VERSION,
            network: network.name().to_string(),
        };
        match self.call(&hello).await? {
            HoleMessage::HelloAck { version } if version == PROTOCOL_VERSION => Ok(()),
            HoleMessage::HelloAck { version } => Err(ProtocolError::VersionMismatch {
                local: PROTOCOL_VERSION,
                remote: version,
            }),
            HoleMessage::Error(failure) => Err(ProtocolError::RemoteError {
                code: failure.code(),
                message: format!("{failure:?}"),
            }),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "HelloAck",
                got: other.type_name(),
            }),
        }
    }

    /// Send one request and wait for its response.
    pub async fn call(&mut self, request: &HoleMessage) -> ProtocolResult<HoleMessage> {
        HoleCodec::write(&mut self.stream, request).await?;
        HoleCodec::read(&mut self.stream)
            .await?
            .ok_or(ProtocolError::ConnectionClosed)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}
