//! Gossip boundary to the overlay mesh
//!
//! The mesh is an external collaborator: it delivers opaque payloads and
//! surfaces peer liveness. On connect it receives the nameserver as a
//! [`Gossiper`] and hands back a [`GossipHandle`] for sending. Payloads
//! are the deterministic entry-vector encoding from `meshname_core::codec`;
//! merges return only the subset that changed local state, so onward
//! broadcasts decay to nothing once the network is quiescent.

use crate::nameserver::Nameserver;
use meshname_core::{codec, Entries, Error, PeerName, Result};
use tracing::warn;

/// Send half of the gossip channel, implemented by the mesh.
pub trait GossipHandle: Send + Sync {
    /// Enqueue a payload for delivery to all peers.
    fn gossip_broadcast(&self, payload: Vec<u8>);

    /// Enqueue a payload for delivery to one peer.
    fn gossip_unicast(&self, peer: PeerName, payload: Vec<u8>);
}

/// Receive half of the gossip channel, implemented by the nameserver and
/// registered with the mesh on connect.
pub trait Gossiper: Send + Sync {
    /// Whole-set snapshot, exchanged with a newly connected peer.
    fn gossip(&self) -> Result<Vec<u8>>;

    /// Merge a snapshot received directly from one peer. The changed
    /// subset is re-broadcast so the rest of the mesh learns it too.
    fn on_gossip_unicast(&self, sender: PeerName, payload: &[u8]) -> Result<()>;

    /// Merge a broadcast payload; returns the encoded changed subset for
    /// onward forwarding, or `None` when nothing changed.
    fn on_gossip_broadcast(&self, sender: PeerName, payload: &[u8]) -> Result<Option<Vec<u8>>>;

    /// A peer has left the mesh.
    fn peer_gone(&self, peer: PeerName);
}

fn decode_payload(sender: PeerName, payload: &[u8]) -> Result<Entries> {
    codec::decode_entries(payload).map_err(|e: Error| {
        warn!("dropping undecodable gossip payload from {}: {}", sender, e);
        e
    })
}

impl Gossiper for Nameserver {
    fn gossip(&self) -> Result<Vec<u8>> {
        codec::encode_entries(&self.entries())
    }

    fn on_gossip_unicast(&self, sender: PeerName, payload: &[u8]) -> Result<()> {
        let incoming = decode_payload(sender, payload)?;
        let delta = self.apply_gossip(incoming);
        self.broadcast(&delta);
        Ok(())
    }

    fn on_gossip_broadcast(&self, sender: PeerName, payload: &[u8]) -> Result<Option<Vec<u8>>> {
        let incoming = decode_payload(sender, payload)?;
        let delta = self.apply_gossip(incoming);
        if delta.is_empty() {
            Ok(None)
        } else {
            Ok(Some(codec::encode_entries(&delta)?))
        }
    }

    fn peer_gone(&self, peer: PeerName) {
        Nameserver::peer_gone(self, peer);
    }
}
