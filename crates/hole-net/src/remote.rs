use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use hole_protocol::{codes, Channel, HoleMessage, ProtocolError};
use hole_store::{BackendError, BackendResult, Block, Holeable};
use hole_types::{Address, Network, Version};

/// Idle connections kept per peer.
const MAX_IDLE_CHANNELS: usize = 8;

/// Backend storing every block on one fixed peer.
///
/// Each operation is a single request/response round trip. Connections are
/// pooled so that operations on different addresses can be in flight at the
/// same time; a connection that fails or times out is dropped, never reused.
/// There is no caching and no retry: failures surface as `Unreachable` or
/// `Timeout`.
pub struct RemoteBackend {
    network: Network,
    host: SocketAddr,
    timeout: Option<Duration>,
    idle: Mutex<Vec<Channel>>,
    joined: AtomicBool,
}

impl RemoteBackend {
    pub fn new(network: Network, host: SocketAddr, timeout: Option<Duration>) -> Self {
        Self {
            network,
            host,
            timeout,
            idle: Mutex::new(Vec::new()),
            joined: AtomicBool::new(false),
        }
    }

    pub fn host(&self) -> SocketAddr {
        self.host
    }

    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::Acquire)
    }

    async fn with_timeout<T, F>(&self, fut: F) -> BackendResult<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
                debug!(host = %self.host, "round trip timed out");
                Err(BackendError::Timeout(limit.as_millis() as u64))
            }),
            None => fut.await,
        }
    }

    async fn connect(&self) -> BackendResult<Channel> {
        Channel::connect(self.host, &self.network)
            .await
            .map_err(|e| protocol_failure(self.host, e))
    }

    fn checkout(&self) -> Option<Channel> {
        self.idle.lock().expect("channel pool poisoned").pop()
    }

    fn checkin(&self, channel: Channel) {
        let mut idle = self.idle.lock().expect("channel pool poisoned");
        if idle.len() < MAX_IDLE_CHANNELS {
            idle.push(channel);
        }
    }

    /// Send one request on a pooled (or fresh) connection.
    ///
    /// The channel is returned to the pool only after a complete exchange; if
    /// the exchange fails or the timeout drops this future, the connection is
    /// discarded with it.
    async fn round_trip(&self, request: &HoleMessage) -> BackendResult<HoleMessage> {
        if !self.is_joined() {
            return Err(BackendError::NotJoined);
        }
        self.with_timeout(async {
            let mut channel = match self.checkout() {
                Some(channel) => channel,
                None => self.connect().await?,
            };
            let response = channel
                .call(request)
                .await
                .map_err(|e| protocol_failure(self.host, e))?;
            self.checkin(channel);
            Ok(response)
        })
        .await
    }
}

/// Normalize a channel failure into the backend taxonomy.
fn protocol_failure(host: SocketAddr, err: ProtocolError) -> BackendError {
    match err {
        ProtocolError::RemoteError { code, message } => BackendError::Remote { code, message },
        ProtocolError::VersionMismatch { local, remote } => BackendError::Remote {
            code: codes::UNSUPPORTED_VERSION,
            message: format!("peer {host} speaks protocol {remote}, we speak {local}"),
        },
        other => BackendError::Unreachable(format!("{host}: {other}")),
    }
}

fn unexpected(host: SocketAddr, expected: &str, got: &HoleMessage) -> BackendError {
    BackendError::Remote {
        code: codes::BAD_REQUEST,
        message: format!("peer {host} answered {} to a {expected} request", got.type_name()),
    }
}

#[async_trait]
impl Holeable for RemoteBackend {
    async fn join(&self) -> BackendResult<()> {
        if self.is_joined() {
            return Ok(());
        }
        let channel = self.with_timeout(self.connect()).await?;
        self.checkin(channel);
        self.joined.store(true, Ordering::Release);
        info!(host = %self.host, network = %self.network, "joined remote peer");
        Ok(())
    }

    async fn leave(&self) -> BackendResult<()> {
        self.joined.store(false, Ordering::Release);
        self.idle.lock().expect("channel pool poisoned").clear();
        info!(host = %self.host, "left remote peer");
        Ok(())
    }

    async fn put(&self, address: &Address, block: &Block) -> BackendResult<()> {
        block.check(address)?;
        let request = HoleMessage::Put {
            address: *address,
            block: block.clone(),
        };
        match self.round_trip(&request).await? {
            HoleMessage::Ack => Ok(()),
            HoleMessage::Error(failure) => Err(failure.into_backend(address)),
            other => Err(unexpected(self.host, "Put", &other)),
        }
    }

    async fn get(&self, address: &Address, version: Option<Version>) -> BackendResult<Block> {
        let request = HoleMessage::Get {
            address: *address,
            version,
        };
        let block = match self.round_trip(&request).await? {
            HoleMessage::Block { block } => block,
            HoleMessage::Error(failure) => return Err(failure.into_backend(address)),
            other => return Err(unexpected(self.host, "Get", &other)),
        };
        if let Err(err) = block.check(address) {
            error!(host = %self.host, %address, %err, "peer returned a block that fails verification");
            return Err(err);
        }
        if address.family().is_mutable() && version.is_some() && block.version() != version {
            return Err(BackendError::Remote {
                code: codes::BAD_REQUEST,
                message: format!(
                    "peer {} returned version {:?} for requested {:?}",
                    self.host,
                    block.version(),
                    version
                ),
            });
        }
        Ok(block)
    }

    async fn kill(&self, address: &Address) -> BackendResult<()> {
        let request = HoleMessage::Kill { address: *address };
        match self.round_trip(&request).await? {
            HoleMessage::Ack => Ok(()),
            HoleMessage::Error(failure) => Err(failure.into_backend(address)),
            other => Err(unexpected(self.host, "Kill", &other)),
        }
    }
}

impl std::fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("host", &self.host)
            .field("network", &self.network)
            .field("joined", &self.is_joined())
            .finish()
    }
}
