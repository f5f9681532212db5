//! In-memory gossip router for integration tests
//!
//! Stands in for the overlay mesh: peers connect with their `Gossiper`
//! callbacks and get back a `GossipHandle`. Messages queue until `flush`,
//! which also delivers the deltas peers generate while forwarding, so one
//! flush settles the whole network.

use meshname_core::PeerName;
use meshnamed::gossip::{GossipHandle, Gossiper};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

enum Message {
    Broadcast {
        from: PeerName,
        payload: Vec<u8>,
    },
    Unicast {
        from: PeerName,
        to: PeerName,
        payload: Vec<u8>,
    },
}

#[derive(Default)]
struct Shared {
    peers: Mutex<HashMap<PeerName, Arc<dyn Gossiper>>>,
    queue: Mutex<VecDeque<Message>>,
}

/// Test mesh delivering gossip between registered peers on demand.
#[derive(Default)]
pub struct TestRouter {
    shared: Arc<Shared>,
}

impl TestRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer's receive callbacks; the returned handle is its
    /// send half.
    pub fn connect(&self, peer: PeerName, gossiper: Arc<dyn Gossiper>) -> Arc<dyn GossipHandle> {
        self.shared.peers.lock().insert(peer, gossiper);
        Arc::new(RouterHandle {
            shared: Arc::clone(&self.shared),
            owner: peer,
        })
    }

    /// Drop a peer from the mesh; queued messages to it are discarded at
    /// delivery time.
    pub fn remove_peer(&self, peer: PeerName) {
        self.shared.peers.lock().remove(&peer);
    }

    /// Anti-entropy: deliver `from`'s full snapshot to `to`.
    pub fn send_snapshot(&self, from: PeerName, to: PeerName) {
        let (src, dst) = {
            let peers = self.shared.peers.lock();
            (peers.get(&from).cloned(), peers.get(&to).cloned())
        };
        if let (Some(src), Some(dst)) = (src, dst) {
            if let Ok(snapshot) = src.gossip() {
                let _ = dst.on_gossip_unicast(from, &snapshot);
            }
        }
    }

    /// Deliver every queued message, including deltas generated while
    /// draining. Terminates because forwarded deltas decay to empty.
    pub fn flush(&self) {
        loop {
            let msg = self.shared.queue.lock().pop_front();
            let Some(msg) = msg else { break };
            match msg {
                Message::Broadcast { from, payload } => {
                    let targets: Vec<(PeerName, Arc<dyn Gossiper>)> = self
                        .shared
                        .peers
                        .lock()
                        .iter()
                        .filter(|(name, _)| **name != from)
                        .map(|(name, gossiper)| (*name, Arc::clone(gossiper)))
                        .collect();
                    for (name, gossiper) in targets {
                        if let Ok(Some(delta)) = gossiper.on_gossip_broadcast(from, &payload) {
                            self.shared.queue.lock().push_back(Message::Broadcast {
                                from: name,
                                payload: delta,
                            });
                        }
                    }
                }
                Message::Unicast { from, to, payload } => {
                    let target = self.shared.peers.lock().get(&to).cloned();
                    if let Some(gossiper) = target {
                        let _ = gossiper.on_gossip_unicast(from, &payload);
                    }
                }
            }
        }
    }
}

struct RouterHandle {
    shared: Arc<Shared>,
    owner: PeerName,
}

impl GossipHandle for RouterHandle {
    fn gossip_broadcast(&self, payload: Vec<u8>) {
        self.shared.queue.lock().push_back(Message::Broadcast {
            from: self.owner,
            payload,
        });
    }

    fn gossip_unicast(&self, peer: PeerName, payload: Vec<u8>) {
        self.shared.queue.lock().push_back(Message::Unicast {
            from: self.owner,
            to: peer,
            payload,
        });
    }
}
