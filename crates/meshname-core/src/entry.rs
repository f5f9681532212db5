//! Entry tuples and the replicated ordered set
//!
//! `Entries` is kept sorted by (lowercase hostname, container id, origin,
//! address), with at most one entry per key. Peers converge by merging
//! sorted sets under last-writer-wins on the per-tuple version counter;
//! on equal versions the larger tombstone wins, so a deletion is never
//! lost to a concurrent re-announcement of the same version.
//!
//! The `stopped` flag is a purely local annotation ("loaded from the
//! journal, awaiting revival") and is never serialized.

use crate::types::{Address, PeerName};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single hostname binding replicated across the mesh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Opaque identifier of the local resource that owns the binding on
    /// its origin peer. Empty for entries not tied to a container.
    pub container_id: String,
    /// Peer that authored the binding. Only the origin tombstones or
    /// resurrects its own entries.
    pub origin: PeerName,
    pub addr: Address,
    /// Hostname as originally registered, preserved for reverse lookups.
    pub hostname: String,
    /// Lowercase form used for matching and ordering. Derived, not
    /// serialized; rebuilt whenever entries cross a codec boundary.
    #[serde(skip)]
    lhostname: String,
    pub version: u64,
    /// 0 while live, otherwise the wall-clock second the entry was
    /// logically deleted.
    pub tombstone: i64,
    /// Loaded from the journal and awaiting revival; suppressed from
    /// lookups and never serialized.
    #[serde(skip)]
    pub stopped: bool,
}

impl Entry {
    /// Create a live entry with a fresh version counter.
    pub fn new(hostname: &str, container_id: &str, origin: PeerName, addr: Address) -> Self {
        Self {
            container_id: container_id.to_string(),
            origin,
            addr,
            hostname: hostname.to_string(),
            lhostname: hostname.to_lowercase(),
            version: 0,
            tombstone: 0,
            stopped: false,
        }
    }

    /// Lowercase hostname used for matching.
    pub fn lhostname(&self) -> &str {
        &self.lhostname
    }

    /// Ordering key: (lowercase hostname, container id, origin, addr).
    fn key(&self) -> (&str, &str, PeerName, Address) {
        (&self.lhostname, &self.container_id, self.origin, self.addr)
    }

    /// Whether the entry is served by lookups.
    pub fn is_visible(&self) -> bool {
        self.tombstone == 0 && !self.stopped
    }

    /// Fold a same-key entry into this one under last-writer-wins.
    /// Returns true iff local state changed.
    fn merge(&mut self, other: &Entry) -> bool {
        if other.version > self.version {
            self.version = other.version;
            self.tombstone = other.tombstone;
            // A newer state from the network reconfirms the entry.
            self.stopped = false;
            true
        } else if other.version == self.version && other.tombstone > self.tombstone {
            self.tombstone = other.tombstone;
            true
        } else {
            false
        }
    }
}

/// Sorted set of entries, at most one per key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entries(Vec<Entry>);

impl Entries {
    /// Build a set from an arbitrary vector: rebuild lowercase names,
    /// sort, and collapse duplicate keys keeping the LWW winner.
    pub fn from_vec(mut entries: Vec<Entry>) -> Self {
        for e in &mut entries {
            e.lhostname = e.hostname.to_lowercase();
        }
        entries.sort_by(|a, b| a.key().cmp(&b.key()));
        let mut out: Vec<Entry> = Vec::with_capacity(entries.len());
        for e in entries {
            if let Some(last) = out.last_mut() {
                if last.key() == e.key() {
                    last.merge(&e);
                    continue;
                }
            }
            out.push(e);
        }
        Self(out)
    }

    pub fn into_vec(self) -> Vec<Entry> {
        self.0
    }

    /// Insert or resurrect the entry for the given tuple. A live entry is
    /// left untouched (idempotent); a tombstoned one is revived with a
    /// bumped version. Returns the resulting entry state.
    pub fn add(
        &mut self,
        hostname: &str,
        container_id: &str,
        origin: PeerName,
        addr: Address,
    ) -> Entry {
        let probe = Entry::new(hostname, container_id, origin, addr);
        match self.0.binary_search_by(|e| e.key().cmp(&probe.key())) {
            Ok(i) => {
                let e = &mut self.0[i];
                if e.tombstone > 0 {
                    e.tombstone = 0;
                    e.version += 1;
                    e.stopped = false;
                }
                e.clone()
            }
            Err(i) => {
                self.0.insert(i, probe.clone());
                probe
            }
        }
    }

    /// Merge a sorted set of incoming entries, returning the subset whose
    /// local state changed (inserted or version-advanced). The returned
    /// subset is exactly what must be re-broadcast; when it is empty the
    /// network is quiescent.
    pub fn merge(&mut self, incoming: &Entries) -> Entries {
        let mut changed = Vec::new();
        let mut i = 0;
        for inc in incoming.0.iter() {
            while i < self.0.len() && self.0[i].key() < inc.key() {
                i += 1;
            }
            if i < self.0.len() && self.0[i].key() == inc.key() {
                if self.0[i].merge(inc) {
                    changed.push(self.0[i].clone());
                }
            } else {
                self.0.insert(i, inc.clone());
                changed.push(inc.clone());
            }
            i += 1;
        }
        Entries(changed)
    }

    /// Tombstone every entry matching the predicate, stamping `now` and
    /// bumping the version. Returns the changed subset for broadcast.
    pub fn tombstone(&mut self, now: i64, mut pred: impl FnMut(&Entry) -> bool) -> Entries {
        let mut changed = Vec::new();
        for e in &mut self.0 {
            if pred(e) {
                e.version += 1;
                e.tombstone = now;
                changed.push(e.clone());
            }
        }
        Entries(changed)
    }

    /// Keep only entries matching the predicate.
    pub fn retain(&mut self, mut pred: impl FnMut(&Entry) -> bool) {
        self.0.retain(|e| pred(e));
    }

    /// Physically remove tombstones stamped before `cutoff`. Not gossiped:
    /// every peer expires its own copies on its own clock.
    pub fn delete_tombstones_older_than(&mut self, cutoff: i64) {
        self.retain(|e| e.tombstone == 0 || e.tombstone >= cutoff);
    }

    /// All entries for a hostname, matched case-insensitively.
    pub fn lookup(&self, hostname: &str) -> &[Entry] {
        let name = hostname.to_lowercase();
        let start = self.0.partition_point(|e| e.lhostname.as_str() < name.as_str());
        let end = self.0.partition_point(|e| e.lhostname.as_str() <= name.as_str());
        &self.0[start..end]
    }

    /// First entry matching the predicate, in set order.
    pub fn find(&self, mut pred: impl FnMut(&Entry) -> bool) -> Option<&Entry> {
        self.0.iter().find(|e| pred(e))
    }

    /// Journal wake-up: every live entry of our own origin is tombstoned
    /// with `now`, version-bumped, and marked stopped pending revival.
    /// Entries already tombstoned before the restart keep their original
    /// stamp, and replicas of other origins are never touched.
    pub fn mark_restored(&mut self, our_name: PeerName, now: i64) {
        for e in &mut self.0 {
            if e.origin == our_name && e.tombstone == 0 {
                e.version += 1;
                e.tombstone = now;
                e.stopped = true;
            }
        }
    }

    /// Revive every stopped entry of our own origin, returning them along
    /// with our origin's still-tombstoned entries so peers that missed a
    /// deletion learn it from the same delta.
    pub fn restore_stopped(&mut self, our_name: PeerName) -> Entries {
        let mut changed = Vec::new();
        for e in &mut self.0 {
            if e.origin != our_name {
                continue;
            }
            if e.stopped {
                e.stopped = false;
                e.tombstone = 0;
                e.version += 1;
                changed.push(e.clone());
            } else if e.tombstone > 0 {
                changed.push(e.clone());
            }
        }
        Entries(changed)
    }
}

impl std::ops::Deref for Entries {
    type Target = [Entry];

    fn deref(&self) -> &[Entry] {
        &self.0
    }
}

impl Serialize for Entries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(Entries::from_vec(entries))
    }
}
