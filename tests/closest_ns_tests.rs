//! Zone-cut search: delegation fallback, xNAME tunnelling under the NS
//! key, and the DS-at-cut special case.

mod common;

use common::*;
use mimir::dns::{Packet, Rcode, RecordType};
use mimir::QueryState;

#[test]
fn delegation_alone_is_not_an_answer() {
    let cache = test_cache();
    cache
        .insert_rr(&ns_set("com.", 172_800, "a.gtld-servers.net."), insecure(), 100)
        .unwrap();

    // The cut is found but no NSEC chain backs a denial, so the caller's
    // state is preserved and it proceeds upstream.
    let mut qry = query("sub.example.com.", RecordType::A, 150);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Produce);
    assert!(pkt.answers.is_empty());
    assert_eq!(cache.stats().misses(), 1);
}

#[test]
fn cname_tunnelled_under_ns_key_answers_exact_queries() {
    let cache = test_cache();
    cache
        .insert_rr(
            &cname_set("www.example.com.", 120, "example.com."),
            secure(),
            100,
        )
        .unwrap();

    let mut qry = query("www.example.com.", RecordType::A, 160);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Done);
    assert_eq!(pkt.header.rcode, Rcode::NoError);
    assert_eq!(pkt.answers.len(), 1);
    assert_eq!(pkt.answers[0].rtype, RecordType::CNAME);
    assert_eq!(pkt.answers[0].ttl, 60);
    assert_eq!(
        pkt.answers[0].rdata,
        name("example.com.").wire().to_vec()
    );
}

#[test]
fn ns_stash_does_not_clobber_the_cname() {
    let cache = test_cache();
    cache
        .insert_rr(
            &cname_set("x.example.com.", 300, "y.example.com."),
            secure(),
            100,
        )
        .unwrap();
    cache
        .insert_rr(&ns_set("x.example.com.", 600, "ns.example.com."), secure(), 100)
        .unwrap();

    // Both sub-entries live under the one NS key.
    let cname = cache
        .peek_exact(&name("x.example.com."), RecordType::CNAME)
        .unwrap();
    assert_eq!(cname.ttl, 300);
    let ns = cache
        .peek_exact(&name("x.example.com."), RecordType::NS)
        .unwrap();
    assert_eq!(ns.ttl, 600);

    // An exact CNAME query still answers from the bundle.
    let mut qry = query("x.example.com.", RecordType::CNAME, 110);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Done);
    assert_eq!(pkt.answers[0].rtype, RecordType::CNAME);
    assert_eq!(pkt.answers[0].ttl, 290);
}

#[test]
fn cname_is_invisible_to_ancestor_walks() {
    let cache = test_cache();
    cache
        .insert_rr(
            &cname_set("example.com.", 300, "other.com."),
            secure(),
            100,
        )
        .unwrap();

    // The alias applies to the exact name only; a sub-name walk must not
    // pick it up.
    let mut qry = query("deep.example.com.", RecordType::A, 110);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Produce);
}

#[test]
fn dname_declines_for_now() {
    let cache = test_cache();
    cache
        .insert_rr(
            &dname_set("example.com.", 300, "example.net."),
            secure(),
            100,
        )
        .unwrap();

    // DNAME substitution is the iterator's job; peek reports a miss.
    let mut qry = query("host.example.com.", RecordType::A, 110);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Produce);
}

#[test]
fn ds_query_skips_the_child_apex() {
    let cache = test_cache();
    cache
        .insert_rr(&ns_set("child.example.com.", 600, "ns.child.example.com."), insecure(), 100)
        .unwrap();
    cache
        .insert_rr(&ns_set("example.com.", 600, "ns.example.com."), insecure(), 100)
        .unwrap();
    // The parent-side proof material: NODATA for DS at the cut.
    cache
        .insert_rr(
            &nsec_set(
                "child.example.com.",
                "d.example.com.",
                &[RecordType::NS, RecordType::NSEC, RecordType::RRSIG],
                "example.com.",
                300,
            ),
            secure(),
            100,
        )
        .unwrap();
    cache.insert_rr(&soa_set("example.com.", 300), secure(), 100).unwrap();

    // A DS query at the cut must not terminate at the child's own NS
    // entry; the parent zone answers with its NSEC proof.
    let mut qry = query("child.example.com.", RecordType::DS, 150);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Done);
    assert_eq!(pkt.header.rcode, Rcode::NoError);
    assert!(pkt.answers.is_empty());
    assert!(
        pkt.authorities
            .iter()
            .any(|r| r.rtype == RecordType::NSEC)
    );
    assert!(pkt.authorities.iter().any(|r| r.rtype == RecordType::SOA));
}

#[test]
fn low_rank_cname_is_not_served() {
    let cache = test_cache();
    cache
        .insert_rr(
            &cname_set("www.example.com.", 120, "example.com."),
            initial_auth(),
            100,
        )
        .unwrap();

    // Aliases require the proven-insecure floor in the cut scan.
    let mut qry = query("www.example.com.", RecordType::A, 110);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Produce);
}
