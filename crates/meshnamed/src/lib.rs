//! meshnamed - gossip-replicated nameserver daemon
//!
//! Each peer of the overlay runs one nameserver. It is authoritative for
//! the hostname bindings of its local containers, replicates them to all
//! peers via gossip, and answers forward and reverse lookups over the
//! merged view.
//!
//! # Modules
//!
//! - [`nameserver`]: Replicated state, local mutations, lifecycle
//! - [`gossip`]: Trait boundary to the overlay mesh
//! - [`db`]: Journal persistence
//! - [`config`]: Daemon configuration

pub mod config;
pub mod db;
pub mod gossip;
pub mod nameserver;

pub use config::Config;
pub use db::{MemStore, SledStore, Store, StoreError};
pub use gossip::{GossipHandle, Gossiper};
pub use nameserver::{Nameserver, NameserverError};
