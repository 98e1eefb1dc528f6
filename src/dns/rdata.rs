//! Field readers over raw RDATA for the record types the cache inspects.
//!
//! The cache never interprets rdata beyond this: RRSIG label counts and
//! signer names drive wildcard-encloser and zone derivation, NSEC next
//! names and type bitmaps drive negative proofs. Malformed rdata reads as
//! `None` and the caller skips the record.

use smallvec::SmallVec;

use super::enums::RecordType;
use super::name::Dname;

/// RRSIG RDATA: type covered (2), algorithm (1), labels (1), original TTL
/// (4), expiration (4), inception (4), key tag (2), signer name, signature.
const RRSIG_SIGNER_OFFSET: usize = 18;

pub fn rrsig_type_covered(rdata: &[u8]) -> Option<RecordType> {
    let raw = u16::from_be_bytes([*rdata.first()?, *rdata.get(1)?]);
    Some(RecordType::from_u16(raw))
}

/// The labels field: the owner's label count at signing time, excluding
/// any wildcard expansion.
pub fn rrsig_labels(rdata: &[u8]) -> Option<u8> {
    rdata.get(3).copied()
}

pub fn rrsig_signer(rdata: &[u8]) -> Option<Dname> {
    let (name, _) = read_uncompressed_name(rdata, RRSIG_SIGNER_OFFSET)?;
    Some(name)
}

/// NSEC RDATA: next owner name followed by the type bitmap.
pub fn nsec_next_name(rdata: &[u8]) -> Option<Dname> {
    let (name, _) = read_uncompressed_name(rdata, 0)?;
    Some(name)
}

/// Walk the NSEC window bitmap and test membership of one type.
pub fn nsec_type_present(rdata: &[u8], rtype: RecordType) -> bool {
    let Some((_, mut pos)) = read_uncompressed_name(rdata, 0) else {
        return false;
    };
    let value = rtype.to_u16();
    let want_window = (value >> 8) as u8;
    let bit = (value & 0xff) as usize;
    while pos + 2 <= rdata.len() {
        let window = rdata[pos];
        let len = rdata[pos + 1] as usize;
        pos += 2;
        if len == 0 || len > 32 || pos + len > rdata.len() {
            return false;
        }
        if window == want_window {
            let byte = bit / 8;
            if byte >= len {
                return false;
            }
            return rdata[pos + byte] & (0x80 >> (bit % 8)) != 0;
        }
        pos += len;
    }
    false
}

/// Encode an NSEC type bitmap from a type list. Used by tests and the
/// prefetch path that fabricates NSEC rdata.
pub fn encode_nsec_rdata(next: &Dname, types: &[RecordType]) -> Vec<u8> {
    let mut windows: SmallVec<[(u8, [u8; 32], usize); 2]> = SmallVec::new();
    for t in types {
        let value = t.to_u16();
        let win = (value >> 8) as u8;
        let bit = (value & 0xff) as usize;
        let idx = match windows.iter().position(|(w, _, _)| *w == win) {
            Some(idx) => idx,
            None => {
                windows.push((win, [0u8; 32], 0));
                windows.len() - 1
            }
        };
        let slot = &mut windows[idx];
        slot.1[bit / 8] |= 0x80 >> (bit % 8);
        slot.2 = slot.2.max(bit / 8 + 1);
    }
    windows.sort_by_key(|(w, _, _)| *w);

    let mut out = next.wire().to_vec();
    for (win, bytes, len) in windows {
        out.push(win);
        out.push(len as u8);
        out.extend_from_slice(&bytes[..len]);
    }
    out
}

fn read_uncompressed_name(buf: &[u8], start: usize) -> Option<(Dname, usize)> {
    let mut labels: SmallVec<[&[u8]; 8]> = SmallVec::new();
    let mut pos = start;
    loop {
        let len = *buf.get(pos)? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        if len > 63 || pos + len > buf.len() {
            return None;
        }
        labels.push(&buf[pos..pos + len]);
        pos += len;
    }
    Dname::from_labels(labels.iter().copied())
        .ok()
        .map(|name| (name, pos))
}
