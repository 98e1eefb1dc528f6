//! Peek path: serve the produce phase of a sub-query from cache.
//!
//! Everything here is fallible-but-quiet: an internal error means the
//! iterator proceeds as if on a miss, never that the query fails.

use tracing::{debug, trace};

use crate::cache::entry::{self, EntryHeader};
use crate::cache::key;
use crate::cache::nsec1::{self, Synthesis};
use crate::cache::rank::{self, Rank};
use crate::cache::Cache;
use crate::dns::enums::{Rcode, RecordClass, RecordType};
use crate::dns::name::Dname;
use crate::dns::packet::Packet;
use crate::dns::rrset::RrSet;
use crate::error::{MimirError, Result};
use crate::query::{QueryCtx, QueryState};

/// Remaining TTL at or below this marks the answer as expiring so the
/// caller can prefetch.
const TTL_EXPIRING: i64 = 5;

pub(crate) fn peek(cache: &Cache, qry: &mut QueryCtx, pkt: &mut Packet) -> QueryState {
    if matches!(qry.state, QueryState::Done | QueryState::Fail) {
        return qry.state;
    }
    if qry.flags.no_cache
        || (qry.flags.tried_cache && qry.stale_cb.is_none())
        || qry.qclass != RecordClass::IN
        || qry.qtype.is_metatype()
        || qry.qname.has_null_label_byte()
    {
        return qry.state;
    }
    qry.flags.tried_cache = true;

    match produce(cache, qry, pkt) {
        Ok(true) => {
            cache.stats().record_hit();
            qry.state = QueryState::Done;
        }
        Ok(false) => {
            cache.stats().record_miss();
        }
        Err(err) => {
            debug!("peek degraded to miss for {}: {}", qry.qname, err);
            cache.stats().record_miss();
        }
    }
    qry.state
}

fn produce(cache: &Cache, qry: &mut QueryCtx, pkt: &mut Packet) -> Result<bool> {
    let floor = rank::lowest_rank(qry);

    // 1. Exact (qname, qtype) entry. Packet entries for tunneled types
    // sit under the plain qtype key, outside the NS bundle.
    let exact = match cache.lookup_entry(&qry.qname, qry.qtype) {
        Err(MimirError::NotFound) if key::tunneled_type(qry.qtype) != qry.qtype => {
            lookup_direct_packet(cache, &qry.qname, qry.qtype)
        }
        other => other,
    };
    match exact {
        Ok((header, payload)) => {
            if header.is_packet() {
                // Packet entries face the same gates as record entries;
                // BOGUS sits at the top of the level order, so cached
                // validation failures still serve.
                if floor.accepts(header.rank) && serve_packet(qry, pkt, &header, &payload)? {
                    return Ok(true);
                }
            } else if floor.accepts(header.rank) {
                let owner = qry.qname.clone();
                let ttl =
                    rank::new_ttl(header.time, header.ttl, Some(qry), &owner, qry.qtype, qry.now);
                if ttl >= 0 {
                    let set = entry::materialize(&payload, owner, qry.qtype, ttl as u32)?;
                    serve_sets(qry, pkt, Rcode::NoError, Some(&set), &[], header.rank);
                    return Ok(true);
                }
            }
        }
        Err(MimirError::Corrupt(reason)) => {
            // Repair by deletion; the record refetches upstream.
            trace!("dropping corrupt entry for {} ({})", qry.qname, reason);
            let lf = key::dname_lf(&qry.qname)?;
            let bad = key::exact_key(&lf, key::tunneled_type(qry.qtype));
            if cache.backend().remove(&bad).is_ok() {
                cache.stats().record_delete();
            }
        }
        Err(_) => {}
    }

    // 2. Walk to the closest zone cut with usable data.
    let Some(cut) = closest_ns(cache, qry)? else {
        // Nothing cached down to the root: the caller falls back to hints.
        return Ok(false);
    };

    match cut.rtype {
        RecordType::CNAME => {
            // Answer the alias; the iterator chases it in a later query.
            let ttl = rank::new_ttl(
                cut.header.time,
                cut.header.ttl,
                Some(qry),
                &cut.owner,
                RecordType::CNAME,
                qry.now,
            );
            if ttl < 0 {
                return Ok(false);
            }
            let set =
                entry::materialize(&cut.payload, cut.owner.clone(), RecordType::CNAME, ttl as u32)?;
            serve_sets(qry, pkt, Rcode::NoError, Some(&set), &[], cut.header.rank);
            Ok(true)
        }
        // DNAME synthesis stays with the iterator.
        RecordType::DNAME => Ok(false),
        _ => {
            // 5. A zone cut but no exact answer: try a cache-only denial.
            let Some(synth) = nsec1::assemble(cache, qry, &cut.owner, floor)? else {
                return Ok(false);
            };
            serve_synthesis(cache, qry, pkt, synth, &cut.owner, floor);
            Ok(true)
        }
    }
}

fn lookup_direct_packet(
    cache: &Cache,
    name: &Dname,
    rtype: RecordType,
) -> Result<(EntryHeader, Vec<u8>)> {
    let lf = key::dname_lf(name)?;
    let cache_key = key::exact_key(&lf, rtype);
    let value = cache.backend().read(&cache_key)?.ok_or(MimirError::NotFound)?;
    let e = entry::single(&value)?;
    if !e.header.is_packet() {
        return Err(MimirError::NotFound);
    }
    Ok((e.header, e.payload.to_vec()))
}

struct FoundCut {
    rtype: RecordType,
    header: EntryHeader,
    payload: Vec<u8>,
    owner: Dname,
}

/// Shorten qname label by label looking for the nearest NS-key bundle
/// with a usable sub-entry. Sub-entries are tried in NS, CNAME, DNAME
/// order; visibility rules differ at the exact name, and a DS query
/// skips the child apex so the parent side is found one label up.
fn closest_ns(cache: &Cache, qry: &QueryCtx) -> Result<Option<FoundCut>> {
    let mut name = qry.qname.clone();
    loop {
        let exact = name == qry.qname;
        let lf = key::dname_lf(&name)?;
        let ns_key = key::exact_key(&lf, RecordType::NS);
        if let Some(value) = cache.backend().read(&ns_key)? {
            for want in [RecordType::NS, RecordType::CNAME, RecordType::DNAME] {
                match want {
                    RecordType::NS if exact && qry.qtype == RecordType::DS => continue,
                    RecordType::CNAME if !(exact && qry.qtype != RecordType::DS) => continue,
                    RecordType::DNAME if exact => continue,
                    _ => {}
                }
                let Ok(e) = entry::seek(&value, want) else {
                    continue;
                };
                if e.header.is_packet() {
                    continue;
                }
                // Delegations are useful at any rank; aliases must clear
                // the proven-insecure floor.
                let sub_floor = if want == RecordType::NS {
                    Rank::INITIAL
                } else {
                    Rank::INSECURE.with_auth()
                };
                if !sub_floor.accepts(e.header.rank) {
                    continue;
                }
                let ttl =
                    rank::new_ttl(e.header.time, e.header.ttl, Some(qry), &name, want, qry.now);
                if ttl < 0 {
                    continue;
                }
                return Ok(Some(FoundCut {
                    rtype: want,
                    header: e.header,
                    payload: e.payload.to_vec(),
                    owner: name,
                }));
            }
        }
        match name.parent() {
            Some(parent) => name = parent,
            None => return Ok(None),
        }
    }
}

/// Fill the packet from a stored wire entry, TTLs decremented by age.
fn serve_packet(
    qry: &mut QueryCtx,
    pkt: &mut Packet,
    header: &EntryHeader,
    payload: &[u8],
) -> Result<bool> {
    let ttl = rank::new_ttl(
        header.time,
        header.ttl,
        Some(qry),
        &qry.qname,
        qry.qtype,
        qry.now,
    );
    if ttl < 0 {
        return Ok(false);
    }
    let elapsed = qry.now.saturating_sub(header.time as u64) as u32;
    let mut cached = Packet::from_wire(payload)?;
    cached.header.id = pkt.header.id;
    for rec in cached.records_mut() {
        if rec.rtype != RecordType::OPT {
            rec.ttl = rec.ttl.saturating_sub(elapsed);
        }
    }
    if header.rank.is_bogus() {
        trace!("serving cached validation failure for {}", qry.qname);
    }
    mark_served(qry, header.rank, ttl);
    *pkt = cached;
    Ok(true)
}

/// Fill the packet from materialized sets and set the served flags.
fn serve_sets(
    qry: &mut QueryCtx,
    pkt: &mut Packet,
    rcode: Rcode,
    answer: Option<&RrSet>,
    authority: &[RrSet],
    served_rank: Rank,
) {
    pkt.renew(qry.qname.clone(), qry.qtype);
    pkt.header.rcode = rcode;
    let mut min_ttl = i64::MAX;
    if let Some(set) = answer {
        min_ttl = min_ttl.min(set.ttl as i64);
        pkt.answers.extend(set.to_records());
        pkt.answers.extend(set.sig_records());
    }
    for set in authority {
        min_ttl = min_ttl.min(set.ttl as i64);
        pkt.authorities.extend(set.to_records());
        pkt.authorities.extend(set.sig_records());
    }
    mark_served(qry, served_rank, min_ttl);
}

fn mark_served(qry: &mut QueryCtx, served_rank: Rank, min_ttl: i64) {
    qry.flags.cached = true;
    qry.flags.no_minimize = true;
    if min_ttl <= TTL_EXPIRING {
        qry.flags.expiring = true;
    }
    if served_rank.is_insecure() {
        qry.flags.dnssec_insecure = true;
        qry.flags.dnssec_want = false;
    }
}

/// Emit a negative proof or wildcard expansion, with the zone SOA
/// attached when it is present and fit.
fn serve_synthesis(
    cache: &Cache,
    qry: &mut QueryCtx,
    pkt: &mut Packet,
    synth: Synthesis,
    zone: &Dname,
    floor: Rank,
) {
    let mut authority = synth.authority;
    if let Some(soa) = read_soa(cache, qry, zone, floor) {
        authority.push(soa);
    }
    serve_sets(
        qry,
        pkt,
        synth.rcode,
        synth.answer.as_ref(),
        &authority,
        Rank::SECURE.with_auth(),
    );
}

fn read_soa(cache: &Cache, qry: &QueryCtx, zone: &Dname, floor: Rank) -> Option<RrSet> {
    let (header, payload) = cache.lookup_entry(zone, RecordType::SOA).ok()?;
    if header.is_packet() || !floor.accepts(header.rank) {
        return None;
    }
    let ttl = rank::new_ttl(
        header.time,
        header.ttl,
        Some(qry),
        zone,
        RecordType::SOA,
        qry.now,
    );
    if ttl < 0 {
        return None;
    }
    entry::materialize(&payload, zone.clone(), RecordType::SOA, ttl as u32).ok()
}
