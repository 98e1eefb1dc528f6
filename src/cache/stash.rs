//! Stash path: ingest resolved records into the store.
//!
//! Stashing is best-effort. Uncacheable input is skipped, backend
//! failures are logged and dropped, and the caller never sees an error:
//! a record that fails to cache costs one upstream refetch, nothing more.

use tracing::{debug, trace};

use crate::cache::entry::{self, flags, EntryHeader};
use crate::cache::key;
use crate::cache::rank::Rank;
use crate::cache::Cache;
use crate::dns::enums::{Rcode, RecordClass, RecordType};
use crate::dns::name::Dname;
use crate::dns::packet::Packet;
use crate::dns::rdata;
use crate::dns::rrset::{self, RrSet};
use crate::error::{MimirError, Result};
use crate::query::QueryCtx;

/// Fallback TTL for negative packets that carry no records to take a
/// TTL from (RFC 2308 suggests 5 minutes).
const NEGATIVE_PACKET_TTL: u32 = 300;

/// Ingest a resolved packet's sections.
pub(crate) fn stash(cache: &Cache, qry: &QueryCtx, pkt: &Packet) {
    if qry.qclass != RecordClass::IN {
        return;
    }
    // Validation failures and aggregate negatives without a usable NSEC1
    // proof are kept whole; everything else is broken into RR-sets.
    if qry.answer_rank.is_bogus() || (is_negative(pkt) && !has_nsec1_proof(qry, pkt)) {
        if let Err(err) = stash_packet(cache, qry, pkt) {
            debug!("packet stash dropped for {}: {}", qry.qname, err);
        }
        return;
    }

    let sections: [(&[rrset::Record], Rank); 3] = [
        (&pkt.answers, qry.answer_rank),
        (&pkt.authorities, qry.auth_rank),
        // Additional-section glue is unverified by definition.
        (&pkt.additionals, Rank::INITIAL),
    ];
    for (records, section_rank) in sections {
        for set in rrset::group_section(records) {
            match stash_rrset(cache, &set, section_rank, qry.now) {
                Ok(()) => {}
                Err(MimirError::Unsupported(reason)) => {
                    trace!("skipping {} {:?}: {}", set.owner, set.rtype, reason);
                }
                Err(err) => {
                    debug!("stash dropped {} {:?}: {}", set.owner, set.rtype, err);
                }
            }
        }
    }
}

/// Insert or refresh one RR-set (plus covering RRSIGs).
pub(crate) fn stash_rrset(cache: &Cache, set: &RrSet, rank: Rank, now: u64) -> Result<()> {
    if set.is_empty() {
        return Ok(());
    }
    if set.rclass != RecordClass::IN {
        return Err(MimirError::Unsupported("class is not IN"));
    }
    if set.rtype.is_metatype() || set.rtype == RecordType::RRSIG {
        return Err(MimirError::Unsupported("metatype is not cacheable"));
    }
    if matches!(set.rtype, RecordType::NSEC3 | RecordType::NSEC3PARAM) {
        return Err(MimirError::Unsupported("NSEC3 is deferred"));
    }
    // Only packet entries may carry BOGUS; record entries never do.
    if rank.is_bogus() {
        return Err(MimirError::Unsupported("bogus rank on a record entry"));
    }
    if set.rtype == RecordType::NSEC {
        return stash_nsec(cache, set, rank, now);
    }

    let storage_owner = storage_owner(set)?;
    let lf = key::dname_lf(&storage_owner)?;
    let key_type = key::tunneled_type(set.rtype);
    let cache_key = key::exact_key(&lf, key_type);

    let ttl = cache.config().clamp_ttl(set.ttl);
    let entry_flags = if key_type == RecordType::NS {
        entry::type_flag(set.rtype)
    } else {
        0
    };
    let header = EntryHeader::new(now as u32, ttl, rank, entry_flags);
    let payload = entry::dematerialize(set);
    if payload.len() > u16::MAX as usize {
        return Err(MimirError::Unsupported("record set exceeds entry bound"));
    }

    splice(cache, &cache_key, key_type, set.rtype, header, &payload, now)
}

/// Store a whole wire packet under (qname, qtype).
pub(crate) fn stash_packet(cache: &Cache, qry: &QueryCtx, pkt: &Packet) -> Result<()> {
    if qry.qtype.is_metatype() {
        return Err(MimirError::Unsupported("metatype is not cacheable"));
    }
    let lf = key::dname_lf(&qry.qname)?;
    let cache_key = key::exact_key(&lf, qry.qtype);

    let wire = pkt.to_wire();
    if wire.len() > u16::MAX as usize {
        return Err(MimirError::Unsupported("packet exceeds entry bound"));
    }
    let ttl = pkt
        .records()
        .filter(|r| r.rtype != RecordType::OPT)
        .map(|r| r.ttl)
        .min()
        .unwrap_or(NEGATIVE_PACKET_TTL);
    let header = EntryHeader::new(
        qry.now as u32,
        cache.config().clamp_ttl(ttl),
        qry.answer_rank,
        flags::IS_PACKET,
    );

    // The splice policy still applies: a fresh higher-ranked entry is not
    // clobbered by a failed validation.
    splice(cache, &cache_key, qry.qtype, qry.qtype, header, &wire, qry.now)
}

/// Owner the set is stored under: the wildcard source of synthesis for
/// wildcard-expanded sets, the owner itself otherwise.
fn storage_owner(set: &RrSet) -> Result<Dname> {
    let Some(sig) = set.sigs.first() else {
        return Ok(set.owner.clone());
    };
    let labels = rdata::rrsig_labels(sig).ok_or(MimirError::Unsupported("truncated RRSIG"))?;
    let owner_labels = set.owner.label_count();
    if (labels as usize) > owner_labels {
        // A labels field above the owner's own count is malformed, never
        // coerced to zero.
        return Err(MimirError::Unsupported("RRSIG labels exceed owner"));
    }
    let wild_labels = owner_labels - labels as usize;
    if wild_labels == 0 {
        return Ok(set.owner.clone());
    }
    let encloser = set
        .owner
        .strip_labels(wild_labels)
        .ok_or(MimirError::Unsupported("RRSIG labels exceed owner"))?;
    encloser
        .prepend_label(b"*")
        .map_err(|_| MimirError::Unsupported("wildcard owner too long"))
}

fn stash_nsec(cache: &Cache, set: &RrSet, rank: Rank, now: u64) -> Result<()> {
    // NSEC is only useful for proofs when validated; the signer names the
    // zone whose chain it belongs to.
    if !rank.is_secure() {
        return Err(MimirError::Unsupported("NSEC below SECURE rank"));
    }
    let Some(sig) = set.sigs.first() else {
        return Err(MimirError::Unsupported("NSEC without RRSIG"));
    };
    let zone = rdata::rrsig_signer(sig).ok_or(MimirError::Unsupported("truncated RRSIG"))?;
    if !set.owner.is_under(&zone) {
        return Err(MimirError::Unsupported("NSEC owner outside signer zone"));
    }
    let zone_lf = key::dname_lf(&zone)?;
    let owner_lf = key::dname_lf(&set.owner)?;
    let rem = key::lf_remainder(&owner_lf, &zone_lf)?;
    let cache_key = key::nsec1_key(&zone_lf, &rem);

    let header = EntryHeader::new(now as u32, cache.config().clamp_ttl(set.ttl), rank, 0);
    let payload = entry::dematerialize(set);
    splice(
        cache,
        &cache_key,
        RecordType::NSEC,
        RecordType::NSEC,
        header,
        &payload,
        now,
    )
}

/// Write an entry, preserving better existing data and, under NS keys,
/// the other sub-entries of the bundle.
fn splice(
    cache: &Cache,
    cache_key: &[u8],
    key_type: RecordType,
    rtype: RecordType,
    header: EntryHeader,
    payload: &[u8],
    now: u64,
) -> Result<()> {
    let existing = cache.backend().read(cache_key)?;
    let mut kept: Vec<(EntryHeader, Vec<u8>)> = Vec::new();

    if let Some(value) = existing.as_deref() {
        if key_type == RecordType::NS {
            let want = entry::type_flag(rtype);
            for e in entry::entries(value) {
                if e.header.flags & want != 0 {
                    if existing_wins(&e.header, &header, now) {
                        trace!("keeping better cached entry for type {:?}", rtype);
                        return Ok(());
                    }
                } else if e.header.flags
                    & (flags::HAS_NS | flags::HAS_CNAME | flags::HAS_DNAME | flags::HAS_NSEC_PARAMS)
                    != 0
                {
                    kept.push((e.header, e.payload.to_vec()));
                }
            }
        } else if let Ok(e) = entry::single(value) {
            if existing_wins(&e.header, &header, now) {
                trace!("keeping better cached entry for type {:?}", rtype);
                return Ok(());
            }
        }
        // A corrupt existing value falls through and is overwritten.
    }

    kept.push((header, payload.to_vec()));
    // Fixed bundle order: NS, CNAME, DNAME, NSEC-params.
    kept.sort_by_key(|(h, _)| h.flags & !flags::IS_PACKET);

    let mut out = Vec::with_capacity(kept.iter().map(|(_, p)| p.len() + 12).sum());
    for (h, p) in &kept {
        h.write(&mut out, p);
    }
    cache.backend().write(cache_key, &out)?;
    cache.stats().record_insert();
    Ok(())
}

/// The splice policy: a fresh existing entry survives when it outranks
/// the newcomer, or matches its rank with at least as much TTL left.
fn existing_wins(existing: &EntryHeader, new: &EntryHeader, now: u64) -> bool {
    let elapsed = now.saturating_sub(existing.time as u64) as i64;
    let residual = existing.ttl as i64 - elapsed;
    if residual < 0 {
        return false;
    }
    existing.rank.level() > new.rank.level()
        || (existing.rank.level() == new.rank.level() && residual >= new.ttl as i64)
}

/// NXDOMAIN, or a NODATA shape: NOERROR with an empty answer section and
/// the zone SOA in authority. Referrals (NS without SOA) are not
/// negative; their delegation records cache as RR-sets.
pub(crate) fn is_negative(pkt: &Packet) -> bool {
    match pkt.header.rcode {
        Rcode::NxDomain => true,
        Rcode::NoError => {
            pkt.answers.is_empty()
                && pkt.authorities.iter().any(|r| r.rtype == RecordType::SOA)
        }
        _ => false,
    }
}

/// A validated NSEC1 denial we can reconstruct from RR-set entries.
fn has_nsec1_proof(qry: &QueryCtx, pkt: &Packet) -> bool {
    qry.auth_rank.is_secure()
        && pkt
            .authorities
            .iter()
            .any(|r| r.rtype == RecordType::NSEC)
}
