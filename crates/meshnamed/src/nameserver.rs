//! Replicated nameserver state and lifecycle
//!
//! One `Nameserver` per peer. A single read/write lock guards the entry
//! set and the journal: lookups and snapshots take the read side, every
//! mutation takes the write side and saves the journal before releasing
//! it. Gossip deltas are prepared under the lock and handed to the mesh
//! after it is released, so the mesh's send path never re-enters us.

use crate::db::{Store, StoreError};
use crate::gossip::GossipHandle;
use meshname_core::{codec, Address, Entries, PeerName};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Fixed journal key; the whole entry set lives under it.
pub const NAMESERVER_KEY: &str = "nameserver";

/// How long a tombstone is kept around so the deletion can propagate.
pub const TOMBSTONE_TIMEOUT: Duration = Duration::from_secs(1800);

const TOMBSTONE_SWEEP_INTERVAL: Duration = Duration::from_secs(180);

/// Process-wide seconds clock, injectable so tests can pin and advance
/// time deterministically.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Clock reading the system time.
pub fn system_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    })
}

/// Liveness oracle for entry origins, provided by the mesh. Incoming
/// gossip entries whose origin fails the check are dropped before merge.
pub type PeerCheck = Arc<dyn Fn(PeerName) -> bool + Send + Sync>;

/// Nameserver errors
#[derive(Debug, Error)]
pub enum NameserverError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("no entry for address {0}")]
    NotFound(Address),
}

/// Authoritative nameserver for one peer of the overlay.
pub struct Nameserver {
    our_name: PeerName,
    entries: RwLock<Entries>,
    db: Arc<dyn Store>,
    gossip: RwLock<Option<Arc<dyn GossipHandle>>>,
    is_known_peer: PeerCheck,
    clock: Clock,
    shutdown_tx: broadcast::Sender<()>,
}

impl Nameserver {
    /// Create a nameserver, restoring any journal left by a previous run.
    /// A journal load failure aborts startup.
    pub fn new(
        our_name: PeerName,
        db: Arc<dyn Store>,
        is_known_peer: PeerCheck,
    ) -> Result<Self, NameserverError> {
        Self::with_clock(our_name, db, is_known_peer, system_clock())
    }

    /// As [`Nameserver::new`], with an explicit clock.
    pub fn with_clock(
        our_name: PeerName,
        db: Arc<dyn Store>,
        is_known_peer: PeerCheck,
        clock: Clock,
    ) -> Result<Self, NameserverError> {
        let mut entries = db.load(NAMESERVER_KEY)?.unwrap_or_default();
        if !entries.is_empty() {
            // Tombstone our own live entries and hold them stopped so
            // nothing stale is served or broadcast until the owning
            // containers are confirmed alive again. Unrevived entries are
            // eventually reaped by the sweeper.
            entries.mark_restored(our_name, (*clock)());
            info!("restored {} entries from journal", entries.len());
        }
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            our_name,
            entries: RwLock::new(entries),
            db,
            gossip: RwLock::new(None),
            is_known_peer,
            clock,
            shutdown_tx,
        })
    }

    /// Our stable peer name.
    pub fn our_name(&self) -> PeerName {
        self.our_name
    }

    /// Install the send half handed back by the mesh on connect.
    pub fn set_gossip(&self, gossip: Arc<dyn GossipHandle>) {
        *self.gossip.write() = Some(gossip);
    }

    /// Launch the tombstone sweeper.
    pub fn start(self: &Arc<Self>) {
        let ns = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = interval(TOMBSTONE_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => ns.delete_tombstones(),
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
    }

    /// Halt the sweeper and release the gossip binding. Idempotent;
    /// in-flight operations run to completion.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
        *self.gossip.write() = None;
    }

    /// Register a hostname binding originated by this peer. Idempotent on
    /// an identical live tuple; a tombstoned tuple is resurrected with a
    /// bumped version. With `restore_stopped`, additionally revives every
    /// entry held stopped since the last restart and re-announces our
    /// remaining tombstones in the same delta.
    pub fn add_entry(
        &self,
        hostname: &str,
        container_id: &str,
        origin: PeerName,
        addr: Address,
        restore_stopped: bool,
    ) {
        info!("adding entry for {}: {} -> {}", container_id, hostname, addr);
        let delta = {
            let mut entries = self.entries.write();
            let mut delta = if restore_stopped {
                entries.restore_stopped(self.our_name).into_vec()
            } else {
                Vec::new()
            };
            delta.push(entries.add(hostname, container_id, origin, addr));
            self.persist(&entries);
            Entries::from_vec(delta)
        };
        self.broadcast(&delta);
    }

    /// Tombstone this peer's entries matching the given hostname,
    /// container and address; `"*"` matches any value.
    pub fn delete(&self, hostname: &str, container_id: &str, addr_str: &str, addr: Address) {
        info!(
            "tombstoning entries for hostname={} container={} addr={}",
            hostname, container_id, addr_str
        );
        let now = self.now();
        let our_name = self.our_name;
        let lhostname = hostname.to_lowercase();
        let delta = {
            let mut entries = self.entries.write();
            let delta = entries.tombstone(now, |e| {
                e.origin == our_name
                    && (hostname == "*" || e.lhostname() == lhostname)
                    && (container_id == "*" || e.container_id == container_id)
                    && (addr_str == "*" || e.addr == addr)
            });
            if !delta.is_empty() {
                self.persist(&entries);
            }
            delta
        };
        self.broadcast(&delta);
    }

    /// Tombstone every entry of ours owned by the given container.
    pub fn container_died(&self, container_id: &str) {
        let now = self.now();
        let our_name = self.our_name;
        let delta = {
            let mut entries = self.entries.write();
            let delta = entries.tombstone(now, |e| {
                e.origin == our_name && e.container_id == container_id
            });
            if !delta.is_empty() {
                self.persist(&entries);
            }
            delta
        };
        if !delta.is_empty() {
            info!("container {} died, tombstoned {} entries", container_id, delta.len());
        }
        self.broadcast(&delta);
    }

    /// Tombstone every entry originated by a departed peer and announce
    /// the delta, so unreachable addresses stop resolving everywhere
    /// within a gossip round.
    ///
    /// TODO(race): an in-flight broadcast from the departing peer can
    /// re-create its entries after this runs; LWW merge keeps that
    /// consistent, and the next peer-gone delivery or the sweeper
    /// re-tombstones them.
    pub fn peer_gone(&self, peer: PeerName) {
        info!("peer {} gone", peer);
        let now = self.now();
        let delta = {
            let mut entries = self.entries.write();
            let delta = entries.tombstone(now, |e| e.origin == peer);
            if !delta.is_empty() {
                self.persist(&entries);
            }
            delta
        };
        self.broadcast(&delta);
    }

    /// Addresses of all live entries for a hostname, in unspecified
    /// order; callers sort if they need to.
    pub fn lookup(&self, hostname: &str) -> Vec<Address> {
        let entries = self.entries.read();
        entries
            .lookup(hostname)
            .iter()
            .filter(|e| e.is_visible())
            .map(|e| e.addr)
            .collect()
    }

    /// Display hostname of a live entry with the given address.
    pub fn reverse_lookup(&self, addr: Address) -> Result<String, NameserverError> {
        let entries = self.entries.read();
        entries
            .find(|e| e.is_visible() && e.addr == addr)
            .map(|e| e.hostname.clone())
            .ok_or(NameserverError::NotFound(addr))
    }

    /// Snapshot of the whole entry set.
    pub fn entries(&self) -> Entries {
        self.entries.read().clone()
    }

    /// Entry set counters.
    pub fn stats(&self) -> NameserverStats {
        let entries = self.entries.read();
        NameserverStats {
            total: entries.len(),
            tombstones: entries.iter().filter(|e| e.tombstone > 0).count(),
            stopped: entries.iter().filter(|e| e.stopped).count(),
        }
    }

    /// Physically expire tombstones past the timeout. Removal is silent:
    /// every peer expires its own copies on its own clock.
    pub fn delete_tombstones(&self) {
        let cutoff = self.now() - TOMBSTONE_TIMEOUT.as_secs() as i64;
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.delete_tombstones_older_than(cutoff);
        if entries.len() != before {
            debug!("swept {} expired tombstones", before - entries.len());
            self.persist(&entries);
        }
    }

    /// Merge entries received from the mesh, returning the subset that
    /// changed local state (the delta worth forwarding).
    pub(crate) fn apply_gossip(&self, mut incoming: Entries) -> Entries {
        incoming.retain(|e| (*self.is_known_peer)(e.origin));
        let mut entries = self.entries.write();
        let delta = entries.merge(&incoming);
        if !delta.is_empty() {
            self.persist(&entries);
        }
        delta
    }

    pub(crate) fn now(&self) -> i64 {
        (*self.clock)()
    }

    /// Encode and hand a delta to the mesh; empty deltas never produce a
    /// message. Callers must not hold the entry lock.
    pub(crate) fn broadcast(&self, delta: &Entries) {
        if delta.is_empty() {
            return;
        }
        let handle = match self.gossip.read().clone() {
            Some(handle) => handle,
            None => return,
        };
        match codec::encode_entries(delta) {
            Ok(payload) => handle.gossip_broadcast(payload),
            Err(e) => error!("failed to encode gossip delta: {}", e),
        }
    }

    /// Save the set under the fixed journal key. A failure is logged and
    /// the in-memory mutation kept; the next change re-saves everything.
    fn persist(&self, entries: &Entries) {
        if let Err(e) = self.db.save(NAMESERVER_KEY, entries) {
            error!("failed to save name entries: {}", e);
        }
    }
}

/// Entry set counters.
#[derive(Debug, Clone)]
pub struct NameserverStats {
    pub total: usize,
    pub tombstones: usize,
    pub stopped: usize,
}
