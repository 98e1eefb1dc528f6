//! Cache key codec.
//!
//! Keys are `<dname_lf> 0x00 <tag> [<rrtype_be16>]`, where `dname_lf` is
//! the owner name with labels reversed and length-prefixed. Reversed
//! label order gives every name's subtree one contiguous key range, and
//! the mandatory `0x00` separator stops a prefix scan over one name from
//! bleeding into longer sibling names. The byte `0x00` at offset zero is
//! reserved for the version entry, which no real name can produce.

use smallvec::SmallVec;

use crate::dns::enums::RecordType;
use crate::dns::name::{Dname, MAX_NAME_LEN};
use crate::error::{MimirError, Result};

/// Exact name+type entry: RR-set or cached packet.
pub const TAG_EXACT: u8 = b'E';
/// NSEC1 entry indexed by the owner's position in the zone chain.
pub const TAG_NSEC1: u8 = b'1';

/// The single reserved key holding the cache ABI version.
pub const VERSION_KEY: &[u8] = b"\x00\x00V";
/// Stored big-endian at VERSION_KEY; a mismatch at open purges the store.
pub const CACHE_VERSION: u16 = 3;

/// Stack-allocated key buffer: name in LF plus separator, tag, and type.
pub type KeyBuf = SmallVec<[u8; MAX_NAME_LEN + 5]>;

/// Lookup-format encoding of a name, rejecting names that cannot be
/// keyed unambiguously.
pub fn dname_lf(name: &Dname) -> Result<Vec<u8>> {
    if name.has_null_label_byte() {
        return Err(MimirError::Unsupported("zero byte inside a label"));
    }
    let mut lf = Vec::with_capacity(name.wire().len());
    name.write_lf(&mut lf);
    Ok(lf)
}

/// Key for an exact `(name, type)` entry.
pub fn exact_key(lf: &[u8], rtype: RecordType) -> KeyBuf {
    let mut key = KeyBuf::new();
    key.extend_from_slice(lf);
    key.push(0);
    key.push(TAG_EXACT);
    key.extend_from_slice(&rtype.to_u16().to_be_bytes());
    key
}

/// Key for an NSEC1 entry: the zone apex in LF, then the owner's labels
/// below the apex. Keeping the zone prefix shared puts one zone's whole
/// chain into a single contiguous, canonically ordered key range.
pub fn nsec1_key(zone_lf: &[u8], owner_rem_lf: &[u8]) -> KeyBuf {
    let mut key = KeyBuf::new();
    key.extend_from_slice(zone_lf);
    key.push(0);
    key.push(TAG_NSEC1);
    key.extend_from_slice(owner_rem_lf);
    key
}

/// LF remainder of `owner` below `zone_lf`. Errors when the owner is not
/// under the zone.
pub fn lf_remainder(owner_lf: &[u8], zone_lf: &[u8]) -> Result<Vec<u8>> {
    if !owner_lf.starts_with(zone_lf) {
        return Err(MimirError::Unsupported("owner outside its zone"));
    }
    Ok(owner_lf[zone_lf.len()..].to_vec())
}

/// Recover the NSEC owner name from an NSEC1 key.
pub fn nsec1_owner(key: &[u8], zone_lf_len: usize) -> Result<Dname> {
    let rem_at = zone_lf_len + 2;
    if key.len() < rem_at || key[zone_lf_len] != 0 || key[zone_lf_len + 1] != TAG_NSEC1 {
        return Err(MimirError::Corrupt("malformed nsec1 key"));
    }
    let mut owner_lf = Vec::with_capacity(key.len() - 2);
    owner_lf.extend_from_slice(&key[..zone_lf_len]);
    owner_lf.extend_from_slice(&key[rem_at..]);
    Dname::from_lf(&owner_lf)
}

/// CNAME and DNAME are stored under the NS key of their owner so the
/// closest-NS scan finds all three in one read; the entry flags keep them
/// apart.
pub fn tunneled_type(rtype: RecordType) -> RecordType {
    match rtype {
        RecordType::CNAME | RecordType::DNAME => RecordType::NS,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lf_of(text: &str) -> Vec<u8> {
        dname_lf(&text.parse().unwrap()).unwrap()
    }

    #[test]
    fn exact_key_layout() {
        let key = exact_key(&lf_of("example.com."), RecordType::A);
        assert_eq!(
            key.as_slice(),
            b"\x03com\x07example\x00E\x00\x01".as_slice()
        );
    }

    #[test]
    fn separator_stops_prefix_bleed() {
        // "example.com" must not be a key prefix of "examplex.com".
        let a = exact_key(&lf_of("example.com."), RecordType::A);
        let b = exact_key(&lf_of("examplex.com."), RecordType::A);
        assert!(!b.starts_with(&a[..a.len() - 4]));
    }

    #[test]
    fn subtree_keys_share_the_name_prefix() {
        let zone = lf_of("example.com.");
        let sub = lf_of("www.example.com.");
        assert!(sub.starts_with(&zone));
    }

    #[test]
    fn null_label_rejected() {
        let name = Dname::from_labels([b"a\x00".as_slice(), b"com".as_slice()]).unwrap();
        assert!(matches!(
            dname_lf(&name),
            Err(MimirError::Unsupported(_))
        ));
    }

    #[test]
    fn version_key_is_unreachable() {
        // Root has an empty LF, so its keys start 0x00 but diverge at the
        // tag byte.
        let root_key = exact_key(&lf_of("."), RecordType::NS);
        assert_eq!(root_key[0], 0);
        assert_ne!(root_key.as_slice(), VERSION_KEY);
    }

    #[test]
    fn nsec1_owner_round_trip() {
        let zone_lf = lf_of("example.com.");
        let owner: Dname = "a.b.example.com.".parse().unwrap();
        let rem = lf_remainder(&dname_lf(&owner).unwrap(), &zone_lf).unwrap();
        let key = nsec1_key(&zone_lf, &rem);
        assert_eq!(nsec1_owner(&key, zone_lf.len()).unwrap(), owner);
    }

    #[test]
    fn nsec1_chain_orders_canonically() {
        let zone_lf = lf_of("example.com.");
        // Canonical zone order: a, then a's subtree, then b.
        let mut keys: Vec<KeyBuf> = ["a.example.com.", "z.a.example.com.", "b.example.com."]
            .iter()
            .map(|t| {
                let rem = lf_remainder(&lf_of(t), &zone_lf).unwrap();
                nsec1_key(&zone_lf, &rem)
            })
            .collect();
        let sorted = keys.clone();
        keys.sort();
        assert_eq!(keys, sorted);
    }
}
