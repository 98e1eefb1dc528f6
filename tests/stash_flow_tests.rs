//! Packet-level stash: section grouping, wildcard enclosers, glue
//! ranking, and aggregate negative handling.

mod common;

use common::*;
use mimir::dns::rdata;
use mimir::dns::{Packet, Rcode, Record, RecordType};
use mimir::{QueryState, Rank};

#[test]
fn resolved_packet_round_trips_through_stash_and_peek() {
    let cache = test_cache();

    let mut upstream = Packet::query(name("example.com."), RecordType::A);
    upstream.header.qr = true;
    upstream.answers.push(Record::new(
        name("example.com."),
        RecordType::A,
        300,
        vec![192, 0, 2, 1],
    ));
    upstream.answers.push(Record::new(
        name("example.com."),
        RecordType::A,
        300,
        vec![192, 0, 2, 2],
    ));
    upstream.authorities.extend(
        ns_set("example.com.", 600, "ns1.example.com.")
            .to_records(),
    );
    upstream.additionals.push(Record::new(
        name("ns1.example.com."),
        RecordType::A,
        600,
        vec![192, 0, 2, 53],
    ));

    let mut qry = query("example.com.", RecordType::A, 100);
    qry.answer_rank = secure();
    qry.auth_rank = insecure();
    cache.stash(&qry, &upstream);

    // The answer set serves.
    let mut qry = query("example.com.", RecordType::A, 160);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Done);
    assert_eq!(pkt.answers.len(), 2);
    assert_eq!(pkt.answers[0].ttl, 240);

    // The authority NS set landed under its own key.
    let ns = cache
        .peek_exact(&name("example.com."), RecordType::NS)
        .unwrap();
    assert_eq!(ns.rank, insecure());

    // Glue is cached without AUTH: visible to nonauth fetches only.
    let mut qry = query("ns1.example.com.", RecordType::A, 160);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Produce);
    let mut qry = query("ns1.example.com.", RecordType::A, 160);
    qry.flags.nonauth = true;
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Done);
}

#[test]
fn wildcard_signed_answer_is_stored_at_the_source_of_synthesis() {
    let cache = test_cache();

    // foo.example.com answered by *.example.com: the RRSIG labels field
    // (2) reveals the wildcard.
    let mut set = a_set("foo.example.com.", 300, [198, 51, 100, 7]);
    set.push_sig(rrsig_rdata(RecordType::A, 2, &name("example.com.")));
    cache.insert_rr(&set, secure(), 100).unwrap();

    assert!(
        cache
            .peek_exact(&name("*.example.com."), RecordType::A)
            .is_ok()
    );
    assert!(
        cache
            .peek_exact(&name("foo.example.com."), RecordType::A)
            .is_err()
    );
}

#[test]
fn malformed_rrsig_labels_reject_the_set() {
    let cache = test_cache();

    // labels > owner label count is malformed, never coerced to zero.
    let mut set = a_set("foo.example.com.", 300, [198, 51, 100, 7]);
    set.push_sig(rrsig_rdata(RecordType::A, 9, &name("example.com.")));
    assert!(cache.insert_rr(&set, secure(), 100).is_err());
    assert_eq!(cache.count(), 1);
}

#[test]
fn uncacheable_sets_are_rejected() {
    let cache = test_cache();

    let mut opt = mimir::dns::RrSet::new(name("."), RecordType::OPT, 0);
    opt.push_rdata(Vec::new());
    assert!(cache.insert_rr(&opt, secure(), 100).is_err());

    let mut bogus = a_set("example.com.", 300, [192, 0, 2, 1]);
    bogus.rclass = mimir::dns::RecordClass::CH;
    assert!(cache.insert_rr(&bogus, secure(), 100).is_err());

    assert!(
        cache
            .insert_rr(
                &a_set("example.com.", 300, [192, 0, 2, 1]),
                Rank::BOGUS.with_auth(),
                100
            )
            .is_err()
    );
}

#[test]
fn bogus_answer_is_kept_as_a_packet() {
    let cache = test_cache();

    let mut upstream = Packet::query(name("broken.example."), RecordType::A);
    upstream.header.qr = true;
    upstream.answers.push(Record::new(
        name("broken.example."),
        RecordType::A,
        60,
        vec![203, 0, 113, 66],
    ));

    let mut qry = query("broken.example.", RecordType::A, 100);
    qry.answer_rank = Rank::BOGUS.with_auth();
    cache.stash(&qry, &upstream);

    // peek_exact refuses it, peek proper serves the stored wire.
    assert!(
        cache
            .peek_exact(&name("broken.example."), RecordType::A)
            .is_err()
    );
    let mut qry = query("broken.example.", RecordType::A, 130);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Done);
    assert_eq!(pkt.answers[0].ttl, 30);
}

#[test]
fn validated_negative_is_stashed_as_proof_material() {
    let cache = test_cache();
    cache
        .insert_rr(&ns_set("example.com.", 600, "ns.example.com."), secure(), 100)
        .unwrap();

    // An NXDOMAIN carrying a validated NSEC chain goes in as RR-sets so
    // later, different names reuse the proof.
    let mut upstream = Packet::query(name("b.example.com."), RecordType::A);
    upstream.header.qr = true;
    upstream.header.rcode = Rcode::NxDomain;
    let apex = nsec_set(
        "example.com.",
        "example.com.",
        &[RecordType::NS, RecordType::SOA],
        "example.com.",
        300,
    );
    upstream.authorities.extend(apex.to_records());
    upstream.authorities.extend(apex.sig_records());
    upstream.authorities.extend(soa_set("example.com.", 300).to_records());

    let mut qry = query("b.example.com.", RecordType::A, 100);
    qry.answer_rank = secure();
    qry.auth_rank = secure();
    cache.stash(&qry, &upstream);

    // A different name under the same cover now denies from cache alone.
    let mut qry = query("zz.example.com.", RecordType::A, 150);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Done);
    assert_eq!(pkt.header.rcode, Rcode::NxDomain);
}

#[test]
fn nsec3_material_is_refused() {
    let cache = test_cache();

    let mut set = mimir::dns::RrSet::new(name("hash.example.com."), RecordType::NSEC3, 300);
    set.push_rdata(vec![1, 0, 0, 10, 0]);
    set.push_sig(rrsig_rdata(RecordType::NSEC3, 3, &name("example.com.")));
    assert!(cache.insert_rr(&set, secure(), 100).is_err());

    // And nothing NSEC3-shaped ever backs a synthesized denial.
    let _ = rdata::encode_nsec_rdata(&name("example.com."), &[RecordType::A]);
    let mut qry = query("miss.example.com.", RecordType::A, 110);
    let mut pkt = Packet::new();
    assert_eq!(cache.peek(&mut qry, &mut pkt), QueryState::Produce);
}
