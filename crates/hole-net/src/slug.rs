use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use hole_store::{BackendError, BackendResult, Block, Holeable};
use hole_types::{Address, Network, Version};

use crate::remote::RemoteBackend;

/// Tuning for a [`SlugBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlugConfig {
    /// Number of peer acknowledgements a put waits for.
    pub replication: usize,
    /// Per round trip limit applied to every peer.
    pub timeout: Option<Duration>,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            replication: 2,
            timeout: None,
        }
    }
}

/// Backend spreading blocks over a dynamic group of peers.
///
/// Writes fan out to every joined peer; each replica write completes or
/// fails before `put` returns, which succeeds if the replication target was
/// met. Reads of a mutable block's latest version ask every peer and keep
/// the highest verified version. Other reads walk the peers in insertion
/// order and return the first block that verifies against its address;
/// immutable blocks found this way are copied back to the peers that were
/// missing them.
pub struct SlugBackend {
    network: Network,
    config: SlugConfig,
    peers: RwLock<Vec<Arc<RemoteBackend>>>,
    joined: AtomicBool,
}

type PeerTasks<T> = JoinSet<(SocketAddr, BackendResult<T>)>;

impl SlugBackend {
    pub fn new(
        network: Network,
        loci: impl IntoIterator<Item = SocketAddr>,
        config: SlugConfig,
    ) -> Self {
        let slug = Self {
            network,
            config,
            peers: RwLock::new(Vec::new()),
            joined: AtomicBool::new(false),
        };
        for host in loci {
            slug.insert(host);
        }
        slug
    }

    pub fn config(&self) -> &SlugConfig {
        &self.config
    }

    /// Peer addresses in query order.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.snapshot().iter().map(|peer| peer.host()).collect()
    }

    /// Add a peer to the group. If the group is already joined the new peer
    /// is joined too; a peer that cannot be reached stays in the group and is
    /// retried on the next [`Holeable::join`].
    pub async fn add_peer(&self, host: SocketAddr) -> BackendResult<()> {
        let Some(peer) = self.insert(host) else {
            return Ok(());
        };
        info!(%host, "peer added");
        if self.joined.load(Ordering::Acquire) {
            peer.join().await?;
        }
        Ok(())
    }

    /// Remove a peer from the group. Returns `false` if it was not a member.
    pub async fn remove_peer(&self, host: SocketAddr) -> bool {
        let removed = {
            let mut peers = self.peers.write().expect("peer list poisoned");
            let index = peers.iter().position(|peer| peer.host() == host);
            index.map(|i| peers.remove(i))
        };
        match removed {
            Some(peer) => {
                if let Err(err) = peer.leave().await {
                    warn!(%host, %err, "peer leave failed");
                }
                info!(%host, "peer removed");
                true
            }
            None => false,
        }
    }

    fn insert(&self, host: SocketAddr) -> Option<Arc<RemoteBackend>> {
        let mut peers = self.peers.write().expect("peer list poisoned");
        if peers.iter().any(|peer| peer.host() == host) {
            return None;
        }
        let peer = Arc::new(RemoteBackend::new(
            self.network.clone(),
            host,
            self.config.timeout,
        ));
        peers.push(Arc::clone(&peer));
        Some(peer)
    }

    fn snapshot(&self) -> Vec<Arc<RemoteBackend>> {
        self.peers.read().expect("peer list poisoned").clone()
    }

    fn joined_peers(&self) -> BackendResult<Vec<Arc<RemoteBackend>>> {
        if !self.joined.load(Ordering::Acquire) {
            return Err(BackendError::NotJoined);
        }
        let peers: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|peer| peer.is_joined())
            .collect();
        if peers.is_empty() {
            return Err(BackendError::Unreachable("no joined peers".into()));
        }
        Ok(peers)
    }

    /// Target ack count for a put over `available` peers.
    fn quorum(&self, available: usize) -> usize {
        self.config.replication.min(available).max(1)
    }
}

/// Run `op` against every peer concurrently.
fn fan_out<T, F, Fut>(peers: &[Arc<RemoteBackend>], op: F) -> PeerTasks<T>
where
    T: Send + 'static,
    F: Fn(Arc<RemoteBackend>) -> Fut,
    Fut: Future<Output = BackendResult<T>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for peer in peers {
        let host = peer.host();
        let call = op(Arc::clone(peer));
        tasks.spawn(async move { (host, call.await) });
    }
    tasks
}

#[async_trait]
impl Holeable for SlugBackend {
    async fn join(&self) -> BackendResult<()> {
        let peers = self.snapshot();
        if peers.is_empty() {
            return Err(BackendError::Unreachable("no peers configured".into()));
        }
        let mut tasks = fan_out(&peers, |peer| async move { peer.join().await });
        let mut reachable = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => reachable += 1,
                Ok((host, Err(err))) => warn!(%host, %err, "peer unreachable"),
                Err(err) => warn!(%err, "peer join task failed"),
            }
        }
        if reachable == 0 {
            return Err(BackendError::Unreachable(format!(
                "none of {} peers reachable",
                peers.len()
            )));
        }
        self.joined.store(true, Ordering::Release);
        info!(network = %self.network, reachable, total = peers.len(), "joined peer group");
        Ok(())
    }

    async fn leave(&self) -> BackendResult<()> {
        self.joined.store(false, Ordering::Release);
        for peer in self.snapshot() {
            peer.leave().await?;
        }
        info!(network = %self.network, "left peer group");
        Ok(())
    }

    async fn put(&self, address: &Address, block: &Block) -> BackendResult<()> {
        block.check(address)?;
        let peers = self.joined_peers()?;
        let needed = self.quorum(peers.len());
        let target = *address;
        let shared = Arc::new(block.clone());
        let mut tasks = fan_out(&peers, |peer| {
            let block = Arc::clone(&shared);
            async move { peer.put(&target, &block).await }
        });

        let mut acks = 0usize;
        let mut first_err = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((host, Ok(()))) => {
                    acks += 1;
                    debug!(%host, %address, acks, needed, "peer stored block");
                }
                Ok((host, Err(err))) => {
                    warn!(%host, %address, %err, "peer put failed");
                    first_err.get_or_insert(err);
                }
                Err(err) => warn!(%err, "peer put task failed"),
            }
        }
        if acks >= needed {
            return Ok(());
        }
        warn!(%address, acks, needed, "replication target not met");
        Err(first_err.unwrap_or_else(|| {
            BackendError::Unreachable(format!("{acks} of {needed} replicas stored"))
        }))
    }

    async fn get(&self, address: &Address, version: Option<Version>) -> BackendResult<Block> {
        let peers = self.joined_peers()?;
        if version.is_none() && address.family().is_mutable() {
            return latest(&peers, address).await;
        }
        let mut missing = Vec::new();
        let mut corrupt = None;
        let mut last_err = None;

        for peer in &peers {
            match peer.get(address, version).await {
                Ok(block) => {
                    if address.family().is_immutable() {
                        repair(&missing, address, &block).await;
                    }
                    return Ok(block);
                }
                Err(BackendError::NotFound(_)) => missing.push(Arc::clone(peer)),
                Err(err @ BackendError::IntegrityFailure { .. }) => {
                    error!(host = %peer.host(), %address, %err, "skipping corrupt peer");
                    corrupt = Some(err);
                }
                Err(err) => {
                    debug!(host = %peer.host(), %address, %err, "peer get failed");
                    last_err = Some(err);
                }
            }
        }
        Err(corrupt
            .or(last_err)
            .unwrap_or(BackendError::NotFound(*address)))
    }

    async fn kill(&self, address: &Address) -> BackendResult<()> {
        let peers = self.joined_peers()?;
        let target = *address;
        let mut tasks = fan_out(&peers, |peer| async move { peer.kill(&target).await });

        let mut removed = 0usize;
        let mut absent = 0usize;
        let mut first_err = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => removed += 1,
                Ok((_, Err(BackendError::NotFound(_)))) => absent += 1,
                Ok((host, Err(err))) => {
                    warn!(%host, %address, %err, "peer kill failed");
                    first_err.get_or_insert(err);
                }
                Err(err) => warn!(%err, "peer kill task failed"),
            }
        }
        if removed > 0 {
            debug!(%address, removed, "block removed from peer group");
            return Ok(());
        }
        if absent > 0 {
            return Err(BackendError::NotFound(*address));
        }
        Err(first_err.unwrap_or_else(|| BackendError::Unreachable("no peer answered".into())))
    }
}

/// Newest version of a mutable block across the group. Peers lagging behind
/// or holding nothing are outvoted by any peer with a higher version.
async fn latest(peers: &[Arc<RemoteBackend>], address: &Address) -> BackendResult<Block> {
    let target = *address;
    let mut tasks = fan_out(peers, |peer| async move { peer.get(&target, None).await });

    let mut newest: Option<Block> = None;
    let mut corrupt = None;
    let mut last_err = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((host, Ok(block))) => {
                debug!(%host, %address, version = ?block.version(), "peer answered");
                let newer = match &newest {
                    Some(best) => block.version() > best.version(),
                    None => true,
                };
                if newer {
                    newest = Some(block);
                }
            }
            Ok((_, Err(BackendError::NotFound(_)))) => {}
            Ok((host, Err(err @ BackendError::IntegrityFailure { .. }))) => {
                error!(%host, %address, %err, "skipping corrupt peer");
                corrupt = Some(err);
            }
            Ok((host, Err(err))) => {
                debug!(%host, %address, %err, "peer get failed");
                last_err = Some(err);
            }
            Err(err) => warn!(%err, "peer get task failed"),
        }
    }
    newest.ok_or_else(|| {
        corrupt
            .or(last_err)
            .unwrap_or(BackendError::NotFound(*address))
    })
}

/// Copy a block to the peers that reported it missing. Failures are logged.
async fn repair(peers: &[Arc<RemoteBackend>], address: &Address, block: &Block) {
    for peer in peers {
        match peer.put(address, block).await {
            Ok(()) => debug!(host = %peer.host(), %address, "read repair"),
            Err(err) => warn!(host = %peer.host(), %address, %err, "read repair failed"),
        }
    }
}

impl std::fmt::Debug for SlugBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlugBackend")
            .field("network", &self.network)
            .field("config", &self.config)
            .field("peers", &self.peers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        closed_port, serve_local, serve_scripted, serve_slow_puts, test_network,
    };
    use hole_protocol::HoleMessage;
    use hole_store::{ImmutableBlock, MutableBlock};
    use hole_types::{Component, Family};

    fn immutable(content: &[u8]) -> (Address, Block) {
        let ib = ImmutableBlock::new(Component::Contents, content.to_vec());
        (ib.address(), ib.into())
    }

    fn slug(loci: Vec<SocketAddr>, replication: usize) -> SlugBackend {
        SlugBackend::new(
            test_network(),
            loci,
            SlugConfig {
                replication,
                timeout: Some(Duration::from_secs(5)),
            },
        )
    }

    async fn direct(host: SocketAddr) -> RemoteBackend {
        let remote = RemoteBackend::new(test_network(), host, None);
        remote.join().await.unwrap();
        remote
    }

    #[tokio::test]
    async fn put_reaches_every_peer() {
        let dirs: Vec<_> = (0..3).map(|_| tempfile::tempdir().unwrap()).collect();
        let mut loci = Vec::new();
        for dir in &dirs {
            loci.push(serve_local(dir.path()).await);
        }
        let group = slug(loci.clone(), 3);
        group.join().await.unwrap();

        let (address, block) = immutable(b"replicated");
        group.put(&address, &block).await.unwrap();
        for host in loci {
            assert_eq!(direct(host).await.get(&address, None).await.unwrap(), block);
        }
    }

    #[tokio::test]
    async fn put_succeeds_with_one_peer_down() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let loci = vec![
            serve_local(a.path()).await,
            closed_port().await,
            serve_local(b.path()).await,
        ];
        let group = slug(loci, 2);
        group.join().await.unwrap();

        let (address, block) = immutable(b"degraded");
        group.put(&address, &block).await.unwrap();
        assert_eq!(group.get(&address, None).await.unwrap(), block);
    }

    #[tokio::test]
    async fn join_needs_one_reachable_peer() {
        let group = slug(vec![closed_port().await, closed_port().await], 2);
        assert!(matches!(group.join().await, Err(BackendError::Unreachable(_))));

        let empty = slug(Vec::new(), 2);
        assert!(matches!(empty.join().await, Err(BackendError::Unreachable(_))));
    }

    #[tokio::test]
    async fn operations_require_join() {
        let dir = tempfile::tempdir().unwrap();
        let group = slug(vec![serve_local(dir.path()).await], 1);
        let (address, block) = immutable(b"too early");
        assert!(matches!(
            group.put(&address, &block).await,
            Err(BackendError::NotJoined)
        ));
    }

    #[tokio::test]
    async fn get_skips_corrupt_peer() {
        let (address, block) = immutable(b"genuine");
        let (_, forged) = immutable(b"forged");
        let liar = serve_scripted(Some(HoleMessage::Block { block: forged })).await;
        let dir = tempfile::tempdir().unwrap();
        let honest = serve_local(dir.path()).await;
        direct(honest).await.put(&address, &block).await.unwrap();

        let group = slug(vec![liar, honest], 1);
        group.join().await.unwrap();
        assert_eq!(group.get(&address, None).await.unwrap(), block);
    }

    #[tokio::test]
    async fn only_corrupt_peers_is_integrity_failure() {
        let (address, _) = immutable(b"genuine");
        let (_, forged) = immutable(b"forged");
        let liar = serve_scripted(Some(HoleMessage::Block { block: forged })).await;
        let dir = tempfile::tempdir().unwrap();
        let empty = serve_local(dir.path()).await;

        let group = slug(vec![empty, liar], 1);
        group.join().await.unwrap();
        assert!(matches!(
            group.get(&address, None).await,
            Err(BackendError::IntegrityFailure { .. })
        ));
    }

    #[tokio::test]
    async fn all_peers_missing_is_not_found() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let group = slug(
            vec![serve_local(a.path()).await, serve_local(b.path()).await],
            2,
        );
        group.join().await.unwrap();
        let (address, _) = immutable(b"nowhere");
        assert!(group.get(&address, None).await.unwrap_err().is_not_found());
        assert!(group.kill(&address).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn read_repair_fills_missing_peer() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let holder = serve_local(a.path()).await;
        let lagging = serve_local(b.path()).await;
        let (address, block) = immutable(b"repair me");
        direct(holder).await.put(&address, &block).await.unwrap();

        let group = slug(vec![lagging, holder], 1);
        group.join().await.unwrap();
        assert_eq!(group.get(&address, None).await.unwrap(), block);

        assert_eq!(direct(lagging).await.get(&address, None).await.unwrap(), block);
    }

    #[tokio::test]
    async fn mutable_blocks_are_not_repaired() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let holder = serve_local(a.path()).await;
        let lagging = serve_local(b.path()).await;
        let address =
            MutableBlock::derive_address(Family::Imprint, Component::Group, b"dave").unwrap();
        let block: Block =
            MutableBlock::new(Family::Imprint, Component::Group, Version::FIRST, b"m".to_vec())
                .unwrap()
                .into();
        direct(holder).await.put(&address, &block).await.unwrap();

        let group = slug(vec![lagging, holder], 1);
        group.join().await.unwrap();
        assert_eq!(group.get(&address, None).await.unwrap(), block);
        assert!(direct(lagging)
            .await
            .get(&address, None)
            .await
            .unwrap_err()
            .is_not_found());
    }

    fn imprint(version: u64, content: &[u8]) -> Block {
        MutableBlock::new(
            Family::Imprint,
            Component::Group,
            Version::new(version),
            content.to_vec(),
        )
        .unwrap()
        .into()
    }

    #[tokio::test]
    async fn latest_read_prefers_newest_peer() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let stale = serve_local(a.path()).await;
        let fresh = serve_local(b.path()).await;
        let address =
            MutableBlock::derive_address(Family::Imprint, Component::Group, b"erin").unwrap();
        for host in [stale, fresh] {
            direct(host).await.put(&address, &imprint(1, b"v1")).await.unwrap();
        }
        direct(fresh).await.put(&address, &imprint(2, b"v2")).await.unwrap();

        // The stale peer is asked first but must not win.
        let group = slug(vec![stale, fresh], 1);
        group.join().await.unwrap();
        assert_eq!(group.get(&address, None).await.unwrap(), imprint(2, b"v2"));
        assert_eq!(
            group.get(&address, Some(Version::FIRST)).await.unwrap(),
            imprint(1, b"v1")
        );
    }

    #[tokio::test]
    async fn update_missed_by_first_peer_is_still_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let address =
            MutableBlock::derive_address(Family::Imprint, Component::Group, b"fay").unwrap();
        // Answers everything, puts included, with its old version.
        let stuck = serve_scripted(Some(HoleMessage::Block {
            block: imprint(1, b"v1"),
        }))
        .await;
        let healthy = serve_local(dir.path()).await;

        let group = slug(vec![stuck, healthy], 1);
        group.join().await.unwrap();
        group.put(&address, &imprint(2, b"v2")).await.unwrap();
        assert_eq!(group.get(&address, None).await.unwrap(), imprint(2, b"v2"));
    }

    #[tokio::test]
    async fn put_waits_for_slow_replicas() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let delay = Duration::from_millis(200);
        let fast = serve_local(a.path()).await;
        let slow = serve_slow_puts(b.path(), delay).await;

        let group = slug(vec![fast, slow], 1);
        group.join().await.unwrap();
        let (address, block) = immutable(b"written everywhere");
        group.put(&address, &block).await.unwrap();
        assert_eq!(direct(slow).await.get(&address, None).await.unwrap(), block);

        // No replica write may land after the kill.
        group.kill(&address).await.unwrap();
        tokio::time::sleep(delay * 2).await;
        assert!(group.get(&address, None).await.unwrap_err().is_not_found());
        for host in [fast, slow] {
            assert!(direct(host)
                .await
                .get(&address, None)
                .await
                .unwrap_err()
                .is_not_found());
        }
    }

    #[tokio::test]
    async fn kill_succeeds_if_any_peer_removed() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let holder = serve_local(a.path()).await;
        let other = serve_local(b.path()).await;
        let (address, block) = immutable(b"short lived");
        direct(holder).await.put(&address, &block).await.unwrap();

        let group = slug(vec![other, holder], 2);
        group.join().await.unwrap();
        group.kill(&address).await.unwrap();
        assert!(group.get(&address, None).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn peers_can_be_added_and_removed() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let first = serve_local(a.path()).await;
        let second = serve_local(b.path()).await;

        let group = slug(vec![first, first], 2);
        assert_eq!(group.peers(), vec![first]);
        group.join().await.unwrap();

        group.add_peer(second).await.unwrap();
        assert_eq!(group.peers(), vec![first, second]);

        let (address, block) = immutable(b"two copies");
        group.put(&address, &block).await.unwrap();
        assert!(group.remove_peer(first).await);
        assert!(!group.remove_peer(first).await);
        assert_eq!(group.peers(), vec![second]);
        assert_eq!(group.get(&address, None).await.unwrap(), block);
    }

    #[tokio::test]
    async fn unreachable_peer_can_still_be_removed() {
        let dir = tempfile::tempdir().unwrap();
        let live = serve_local(dir.path()).await;
        let dead = closed_port().await;

        let group = slug(vec![dead, live], 1);
        group.join().await.unwrap();
        assert!(group.remove_peer(dead).await);
        assert_eq!(group.peers(), vec![live]);

        let (address, block) = immutable(b"after removal");
        group.put(&address, &block).await.unwrap();
        assert_eq!(group.get(&address, None).await.unwrap(), block);
    }

    #[test]
    fn quorum_never_exceeds_available_peers() {
        let group = slug(Vec::new(), 3);
        assert_eq!(group.quorum(5), 3);
        assert_eq!(group.quorum(2), 2);
        assert_eq!(slug(Vec::new(), 0).quorum(4), 1);
    }
}
