//! Shared builders for the cache integration tests.
#![allow(dead_code)]

use mimir::dns::rdata::encode_nsec_rdata;
use mimir::dns::{Dname, RecordType, RrSet};
use mimir::{Cache, CacheConfig, MemBackend, QueryCtx, Rank};

/// An in-memory cache with the clamp window the test scenarios assume.
/// Run with RUST_LOG=mimir=trace to watch the peek/stash decisions.
pub fn test_cache() -> Cache {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let config = CacheConfig {
        ttl_min: 5,
        ttl_max: 3600,
        path: None,
    };
    Cache::open(Box::new(MemBackend::new()), config).expect("cache open")
}

pub fn name(text: &str) -> Dname {
    text.parse().expect("valid name")
}

pub fn query<'a>(qname: &str, qtype: RecordType, now: u64) -> QueryCtx<'a> {
    QueryCtx::new(name(qname), qtype, now)
}

pub fn a_set(owner: &str, ttl: u32, addr: [u8; 4]) -> RrSet {
    let mut set = RrSet::new(name(owner), RecordType::A, ttl);
    set.push_rdata(addr.to_vec());
    set
}

pub fn ns_set(owner: &str, ttl: u32, target: &str) -> RrSet {
    let mut set = RrSet::new(name(owner), RecordType::NS, ttl);
    set.push_rdata(name(target).wire().to_vec());
    set
}

pub fn cname_set(owner: &str, ttl: u32, target: &str) -> RrSet {
    let mut set = RrSet::new(name(owner), RecordType::CNAME, ttl);
    set.push_rdata(name(target).wire().to_vec());
    set
}

pub fn dname_set(owner: &str, ttl: u32, target: &str) -> RrSet {
    let mut set = RrSet::new(name(owner), RecordType::DNAME, ttl);
    set.push_rdata(name(target).wire().to_vec());
    set
}

pub fn soa_set(owner: &str, ttl: u32) -> RrSet {
    let mut rdata = Vec::new();
    rdata.extend_from_slice(name(&format!("ns1.{}", owner)).wire());
    rdata.extend_from_slice(name(&format!("hostmaster.{}", owner)).wire());
    for field in [2024010101u32, 7200, 3600, 1209600, 300] {
        rdata.extend_from_slice(&field.to_be_bytes());
    }
    let mut set = RrSet::new(name(owner), RecordType::SOA, ttl);
    set.push_rdata(rdata);
    set
}

/// A syntactically complete RRSIG rdata: enough for the cache, which only
/// reads the type covered, the labels field, and the signer.
pub fn rrsig_rdata(covered: RecordType, labels: u8, signer: &Dname) -> Vec<u8> {
    let mut rdata = Vec::new();
    rdata.extend_from_slice(&covered.to_u16().to_be_bytes());
    rdata.push(13);
    rdata.push(labels);
    rdata.extend_from_slice(&300u32.to_be_bytes());
    rdata.extend_from_slice(&1735689600u32.to_be_bytes());
    rdata.extend_from_slice(&1704067200u32.to_be_bytes());
    rdata.extend_from_slice(&12345u16.to_be_bytes());
    rdata.extend_from_slice(signer.wire());
    rdata.extend_from_slice(&[0xab; 16]);
    rdata
}

/// A signed NSEC set ready for stashing into `zone`'s chain.
pub fn nsec_set(owner: &str, next: &str, types: &[RecordType], zone: &str, ttl: u32) -> RrSet {
    let owner_name = name(owner);
    let labels = owner_name.label_count() as u8;
    let mut set = RrSet::new(owner_name, RecordType::NSEC, ttl);
    set.push_rdata(encode_nsec_rdata(&name(next), types));
    set.push_sig(rrsig_rdata(RecordType::NSEC, labels, &name(zone)));
    set
}

pub fn secure() -> Rank {
    Rank::SECURE.with_auth()
}

pub fn insecure() -> Rank {
    Rank::INSECURE.with_auth()
}

pub fn initial_auth() -> Rank {
    Rank::INITIAL.with_auth()
}
