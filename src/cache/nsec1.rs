//! NSEC1 negative-proof assembly.
//!
//! Works entirely from the cached chain of one zone: a predecessor search
//! finds the interval around the query name, the closest provable
//! encloser comes from the longest common suffix with the interval
//! endpoints, and the source of synthesis `*.clencl` decides between
//! NXDOMAIN, NODATA, and a wildcard answer. Any stale, corrupt, or
//! sub-SECURE link abandons the attempt with "nothing found" so the
//! iterator refetches; assembly never errors out of the peek path.

use tracing::trace;

use crate::cache::backend::Found;
use crate::cache::entry;
use crate::cache::key;
use crate::cache::rank::{self, Rank};
use crate::cache::Cache;
use crate::dns::enums::{Rcode, RecordType};
use crate::dns::name::Dname;
use crate::dns::rdata;
use crate::dns::rrset::RrSet;
use crate::error::Result;
use crate::query::QueryCtx;

/// What the assembler hands back to the peek path.
pub(crate) struct Synthesis {
    pub rcode: Rcode,
    pub answer: Option<RrSet>,
    pub authority: Vec<RrSet>,
}

/// One fit NSEC link: the materialized set plus its interval endpoints.
struct ChainLink {
    set: RrSet,
    next: Dname,
}

pub(crate) fn assemble(
    cache: &Cache,
    qry: &QueryCtx,
    zone: &Dname,
    floor: Rank,
) -> Result<Option<Synthesis>> {
    let zone_lf = key::dname_lf(zone)?;
    let qname_lf = key::dname_lf(&qry.qname)?;
    let Ok(q_rem) = key::lf_remainder(&qname_lf, &zone_lf) else {
        return Ok(None);
    };

    // Closest-encloser search: the greatest chain entry at or below qname.
    let Some((link, exact)) = chain_predecessor(cache, qry, &zone_lf, &q_rem)? else {
        return Ok(None);
    };

    if exact {
        // The name exists; NODATA needs the bitmap to deny both the type
        // and a CNAME that could answer it.
        let rdata = &link.set.rdatas[0];
        if rdata::nsec_type_present(rdata, qry.qtype)
            || rdata::nsec_type_present(rdata, RecordType::CNAME)
        {
            return Ok(None);
        }
        trace!("NSEC proves NODATA at {}", qry.qname);
        return Ok(Some(Synthesis {
            rcode: Rcode::NoError,
            answer: None,
            authority: vec![link.set],
        }));
    }

    if !covers(&zone_lf, &q_rem, &link.next)? {
        return Ok(None);
    }

    // Closest provable encloser: the longest suffix qname shares with
    // either interval endpoint.
    let clencl_labels = qry
        .qname
        .common_label_suffix(&link.set.owner)
        .max(qry.qname.common_label_suffix(&link.next));
    let strip = qry.qname.label_count() - clencl_labels;
    let Some(clencl) = qry.qname.strip_labels(strip) else {
        return Ok(None);
    };

    // Source-of-synthesis proof at *.clencl.
    let Ok(wild) = clencl.prepend_label(b"*") else {
        return Ok(None);
    };
    let wild_lf = key::dname_lf(&wild)?;
    let w_rem = key::lf_remainder(&wild_lf, &zone_lf)?;
    let Some((wild_link, wild_exact)) = chain_predecessor(cache, qry, &zone_lf, &w_rem)? else {
        return Ok(None);
    };

    if !wild_exact {
        // The wildcard provably does not exist either: NXDOMAIN, shown by
        // the qname cover and the wildcard cover (one NSEC may be both).
        if !covers(&zone_lf, &w_rem, &wild_link.next)? {
            return Ok(None);
        }
        trace!("NSEC chain proves NXDOMAIN for {}", qry.qname);
        let mut authority = vec![link.set];
        if wild_link.set.owner != authority[0].owner {
            authority.push(wild_link.set);
        }
        return Ok(Some(Synthesis {
            rcode: Rcode::NxDomain,
            answer: None,
            authority,
        }));
    }

    // The wildcard exists. Try to expand it; the qname cover rides along
    // to prove the exact name's non-existence.
    if let Some(answer) = try_wild(cache, qry, &wild, qry.qtype, floor)? {
        trace!("wildcard {} expands {} {:?}", wild, qry.qname, qry.qtype);
        return Ok(Some(Synthesis {
            rcode: Rcode::NoError,
            answer: Some(answer),
            authority: vec![link.set],
        }));
    }
    if qry.qtype != RecordType::CNAME {
        if let Some(answer) = try_wild(cache, qry, &wild, RecordType::CNAME, floor)? {
            trace!("wildcard {} answers {} via CNAME", wild, qry.qname);
            return Ok(Some(Synthesis {
                rcode: Rcode::NoError,
                answer: Some(answer),
                authority: vec![link.set],
            }));
        }
    }

    // No wildcard data in cache: NODATA at the wildcard when its bitmap
    // denies the type.
    let wild_rdata = &wild_link.set.rdatas[0];
    if rdata::nsec_type_present(wild_rdata, qry.qtype)
        || rdata::nsec_type_present(wild_rdata, RecordType::CNAME)
    {
        return Ok(None);
    }
    trace!("NSEC proves NODATA at wildcard for {}", qry.qname);
    let mut authority = vec![link.set];
    if wild_link.set.owner != authority[0].owner {
        authority.push(wild_link.set);
    }
    Ok(Some(Synthesis {
        rcode: Rcode::NoError,
        answer: None,
        authority,
    }))
}

/// Greatest chain entry with owner ≤ the probed name, fit for proofs:
/// fresh, SECURE, structurally sound, inside this zone's chain.
fn chain_predecessor(
    cache: &Cache,
    qry: &QueryCtx,
    zone_lf: &[u8],
    rem: &[u8],
) -> Result<Option<(ChainLink, bool)>> {
    let probe = key::nsec1_key(zone_lf, rem);
    let Some((found_key, value, disp)) = cache.backend().read_leq(&probe)? else {
        return Ok(None);
    };
    let chain_prefix = key::nsec1_key(zone_lf, &[]);
    if !found_key.starts_with(&chain_prefix) {
        return Ok(None);
    }

    let Ok(e) = entry::single(&value) else {
        return Ok(None);
    };
    if !e.header.rank.is_secure() {
        return Ok(None);
    }
    let Ok(owner) = key::nsec1_owner(&found_key, zone_lf.len()) else {
        return Ok(None);
    };
    // Stale links abandon the proof; serve-stale never fabricates denials.
    let ttl = rank::new_ttl(e.header.time, e.header.ttl, None, &owner, RecordType::NSEC, qry.now);
    if ttl < 0 {
        return Ok(None);
    }
    let Ok(set) = entry::materialize(e.payload, owner, RecordType::NSEC, ttl as u32) else {
        return Ok(None);
    };
    let Some(next) = rdata::nsec_next_name(&set.rdatas[0]) else {
        return Ok(None);
    };
    Ok(Some((ChainLink { set, next }, disp == Found::Exact)))
}

/// Does the interval ending at `next` cover the name with LF remainder
/// `rem`? The predecessor search already guarantees owner < name.
fn covers(zone_lf: &[u8], rem: &[u8], next: &Dname) -> Result<bool> {
    let next_lf = match key::dname_lf(next) {
        Ok(lf) => lf,
        Err(_) => return Ok(false),
    };
    let Ok(next_rem) = key::lf_remainder(&next_lf, zone_lf) else {
        // `next` outside the zone never covers anything in it.
        return Ok(false);
    };
    // The last NSEC in the chain points back at the apex and covers
    // everything beyond its owner.
    Ok(next_rem.is_empty() || rem < next_rem.as_slice())
}

/// Exact-entry lookup at the wildcard, owner rewritten to qname.
fn try_wild(
    cache: &Cache,
    qry: &QueryCtx,
    wild: &Dname,
    stype: RecordType,
    floor: Rank,
) -> Result<Option<RrSet>> {
    let Ok((header, payload)) = cache.lookup_entry(wild, stype) else {
        return Ok(None);
    };
    if header.is_packet() || !floor.accepts(header.rank) {
        return Ok(None);
    }
    let ttl = rank::new_ttl(header.time, header.ttl, Some(qry), wild, stype, qry.now);
    if ttl < 0 {
        return Ok(None);
    }
    match entry::materialize(&payload, qry.qname.clone(), stype, ttl as u32) {
        Ok(set) => Ok(Some(set)),
        Err(_) => Ok(None),
    }
}
