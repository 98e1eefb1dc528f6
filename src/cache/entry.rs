//! Entry codec: fixed little-endian header, length-prefixed payload.
//!
//! Layout per entry:
//! ```text
//!   time   u32 LE   insertion wall-clock seconds
//!   ttl    u32 LE   clamped at stash time
//!   rank   u8
//!   flags  u8
//!   len    u16 LE   payload byte count
//!   payload [u8; len]
//! ```
//! An NS-key value may chain several entries back to back (the xNAME
//! bundle); every other key holds exactly one. Readers never trust `len`:
//! each slice is checked against the value bound and violations surface
//! as `Corrupt`, which the caller treats as a miss.

use crate::cache::rank::Rank;
use crate::dns::enums::RecordType;
use crate::dns::name::Dname;
use crate::dns::rrset::RrSet;
use crate::error::{MimirError, Result};

pub const HEADER_LEN: usize = 10;
pub const ENTRY_MIN_LEN: usize = HEADER_LEN + 2;

pub mod flags {
    /// Payload is a whole wire packet, not a dematerialized RR-set.
    pub const IS_PACKET: u8 = 1 << 0;
    /// NSEC3 opt-out applies; packet entries only. Reserved until NSEC3.
    pub const HAS_OPTOUT: u8 = 1 << 1;
    pub const HAS_NS: u8 = 1 << 2;
    pub const HAS_CNAME: u8 = 1 << 3;
    pub const HAS_DNAME: u8 = 1 << 4;
    /// Reserved for NSEC3 parameters at the zone apex.
    pub const HAS_NSEC_PARAMS: u8 = 1 << 5;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub time: u32,
    pub ttl: u32,
    pub rank: Rank,
    pub flags: u8,
}

impl EntryHeader {
    pub fn new(time: u32, ttl: u32, rank: Rank, flags: u8) -> Self {
        Self {
            time,
            ttl,
            rank,
            flags,
        }
    }

    pub fn is_packet(&self) -> bool {
        self.flags & flags::IS_PACKET != 0
    }

    /// Append header, length, and payload to `out`. Payloads are bounded
    /// by the u16 length field; oversized input is a caller bug.
    pub fn write(&self, out: &mut Vec<u8>, payload: &[u8]) {
        debug_assert!(payload.len() <= u16::MAX as usize);
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.ttl.to_le_bytes());
        out.push(self.rank.0);
        out.push(self.flags);
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
    }
}

/// Borrowed view of one entry inside a stored value.
#[derive(Debug, Clone, Copy)]
pub struct EntryRef<'a> {
    pub header: EntryHeader,
    pub payload: &'a [u8],
}

/// Parse the entry at the head of `value`; returns it and the remainder
/// of the chain.
pub fn parse_one(value: &[u8]) -> Result<(EntryRef<'_>, &[u8])> {
    if value.len() < ENTRY_MIN_LEN {
        return Err(MimirError::Corrupt("entry shorter than header"));
    }
    let time = u32::from_le_bytes([value[0], value[1], value[2], value[3]]);
    let ttl = u32::from_le_bytes([value[4], value[5], value[6], value[7]]);
    let rank = Rank(value[8]);
    let entry_flags = value[9];
    let len = u16::from_le_bytes([value[10], value[11]]) as usize;
    if ENTRY_MIN_LEN + len > value.len() {
        return Err(MimirError::Corrupt("entry payload exceeds value bound"));
    }
    Ok((
        EntryRef {
            header: EntryHeader::new(time, ttl, rank, entry_flags),
            payload: &value[ENTRY_MIN_LEN..ENTRY_MIN_LEN + len],
        },
        &value[ENTRY_MIN_LEN + len..],
    ))
}

/// The single entry stored under a non-NS key.
pub fn single(value: &[u8]) -> Result<EntryRef<'_>> {
    let (entry, _) = parse_one(value)?;
    Ok(entry)
}

/// The bundle flag an entry of `rtype` carries under an NS key.
pub fn type_flag(rtype: RecordType) -> u8 {
    match rtype {
        RecordType::NS => flags::HAS_NS,
        RecordType::CNAME => flags::HAS_CNAME,
        RecordType::DNAME => flags::HAS_DNAME,
        RecordType::NSEC3PARAM => flags::HAS_NSEC_PARAMS,
        _ => 0,
    }
}

/// Walk an NS-key chain to the sub-entry for `rtype`.
pub fn seek(value: &[u8], rtype: RecordType) -> Result<EntryRef<'_>> {
    let want = type_flag(rtype);
    if want == 0 {
        return single(value);
    }
    let mut rest = value;
    while !rest.is_empty() {
        let (entry, tail) = parse_one(rest)?;
        if entry.header.flags & want != 0 {
            return Ok(entry);
        }
        rest = tail;
    }
    Err(MimirError::NotFound)
}

/// All entries chained in a value, stopping at the first corruption.
pub fn entries(value: &[u8]) -> Vec<EntryRef<'_>> {
    let mut out = Vec::new();
    let mut rest = value;
    while !rest.is_empty() {
        match parse_one(rest) {
            Ok((entry, tail)) => {
                out.push(entry);
                rest = tail;
            }
            Err(_) => break,
        }
    }
    out
}

/// Serialize an RR-set (and its RRSIGs) into entry payload form:
/// `count u16, (rdlen u16, rdata)*` for data, then the same for sigs.
pub fn dematerialize(rrset: &RrSet) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_rdataset(&mut out, &rrset.rdatas);
    write_rdataset(&mut out, &rrset.sigs);
    out
}

fn write_rdataset(out: &mut Vec<u8>, rdatas: &[Vec<u8>]) {
    out.extend_from_slice(&(rdatas.len() as u16).to_le_bytes());
    for rdata in rdatas {
        out.extend_from_slice(&(rdata.len() as u16).to_le_bytes());
        out.extend_from_slice(rdata);
    }
}

/// Rebuild an RR-set from entry payload. `ttl` is the already-computed
/// remaining TTL the materialized set should carry.
pub fn materialize(payload: &[u8], owner: Dname, rtype: RecordType, ttl: u32) -> Result<RrSet> {
    let mut set = RrSet::new(owner, rtype, ttl);
    let pos = read_rdataset(payload, 0, &mut set.rdatas)?;
    let pos = read_rdataset(payload, pos, &mut set.sigs)?;
    if pos != payload.len() {
        return Err(MimirError::Corrupt("trailing bytes after rdatasets"));
    }
    if set.rdatas.is_empty() {
        return Err(MimirError::Corrupt("entry with empty rdataset"));
    }
    Ok(set)
}

fn read_rdataset(payload: &[u8], mut pos: usize, out: &mut Vec<Vec<u8>>) -> Result<usize> {
    if pos + 2 > payload.len() {
        return Err(MimirError::Corrupt("rdataset count out of bounds"));
    }
    let count = u16::from_le_bytes([payload[pos], payload[pos + 1]]) as usize;
    pos += 2;
    for _ in 0..count {
        if pos + 2 > payload.len() {
            return Err(MimirError::Corrupt("rdata length out of bounds"));
        }
        let len = u16::from_le_bytes([payload[pos], payload[pos + 1]]) as usize;
        pos += 2;
        if pos + len > payload.len() {
            return Err(MimirError::Corrupt("rdata exceeds entry bound"));
        }
        out.push(payload[pos..pos + len].to_vec());
        pos += len;
    }
    Ok(pos)
}
