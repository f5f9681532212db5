//! meshname core library
//!
//! This crate provides the replicated entry model shared by every peer of
//! the meshname overlay: the ordered entry set with its last-writer-wins
//! merge rules, the peer and address types, and the deterministic wire
//! codec used for gossip payloads and the on-disk journal.
//!
//! # Modules
//!
//! - [`types`]: Peer names and IPv4 addresses
//! - [`entry`]: Entry tuples and the ordered-set CRDT
//! - [`codec`]: Deterministic serialization of entry vectors
//! - [`error`]: Error types

pub mod codec;
pub mod entry;
pub mod error;
pub mod types;

pub use entry::{Entries, Entry};
pub use error::{Error, Result};
pub use types::{Address, PeerName};
