//! Deterministic wire encoding for gossip payloads
//!
//! Payloads and journal values are postcard bytes of the sorted entry
//! vector; the `stopped` flag never crosses this boundary. Because the
//! set is sorted and postcard has a single representation per value, the
//! same set always produces the same bytes.

use crate::entry::Entries;
use crate::error::Result;

/// Serialize a set of entries to canonical payload bytes.
pub fn encode_entries(entries: &Entries) -> Result<Vec<u8>> {
    Ok(postcard::to_allocvec(entries)?)
}

/// Deserialize payload bytes into a normalized entry set.
///
/// The decoded vector is re-normalized (lowercase names rebuilt, order
/// restored, duplicate keys collapsed under LWW), so a stale or hostile
/// payload cannot break the sorted-set invariant.
pub fn decode_entries(bytes: &[u8]) -> Result<Entries> {
    Ok(postcard::from_bytes(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, PeerName};

    fn sample() -> Entries {
        let origin: PeerName = "00:00:00:02:00:00".parse().unwrap();
        let mut entries = Entries::default();
        entries.add("Hostname", "c1", origin, Address(1));
        entries.add("other", "c2", origin, Address(2));
        entries.tombstone(1234, |e| e.container_id == "c2");
        entries
    }

    #[test]
    fn test_roundtrip() {
        let entries = sample();
        let bytes = encode_entries(&entries).unwrap();
        let decoded = decode_entries(&bytes).unwrap();
        assert_eq!(entries, decoded);
        assert_eq!(decoded.lookup("hostname")[0].hostname, "Hostname");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let entries = sample();
        assert_eq!(
            encode_entries(&entries).unwrap(),
            encode_entries(&entries).unwrap()
        );
    }

    #[test]
    fn test_stopped_never_crosses_the_wire() {
        let origin: PeerName = "00:00:00:02:00:00".parse().unwrap();
        let mut entries = Entries::default();
        entries.add("host", "c", origin, Address(1));
        entries.mark_restored(origin, 100);
        assert!(entries[0].stopped);

        let bytes = encode_entries(&entries).unwrap();
        let decoded = decode_entries(&bytes).unwrap();
        assert!(!decoded[0].stopped);
        // The tombstone and version do survive
        assert_eq!(decoded[0].tombstone, 100);
        assert_eq!(decoded[0].version, 1);
    }

    #[test]
    fn test_garbage_payload_is_rejected() {
        assert!(decode_entries(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
