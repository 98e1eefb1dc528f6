//! DNSSEC rank byte and TTL arithmetic.
//!
//! The two low bits carry the validation level, bit 2 marks data learned
//! from an authoritative source. Acceptance compares levels and demands
//! AUTH whenever the floor does; comparability across the AUTH axis is
//! partial by design of the lattice.

use crate::query::QueryCtx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rank(pub u8);

impl Rank {
    const LEVEL_MASK: u8 = 0b0000_0011;
    const AUTH: u8 = 0b0000_0100;

    /// Freshly learned, nothing proven.
    pub const INITIAL: Rank = Rank(0);
    /// Proven to sit in an insecure (unsigned) zone.
    pub const INSECURE: Rank = Rank(1);
    /// Validated.
    pub const SECURE: Rank = Rank(2);
    /// Validation failed; only packet entries may carry this.
    pub const BOGUS: Rank = Rank(3);

    pub fn with_auth(self) -> Rank {
        Rank(self.0 | Self::AUTH)
    }

    pub fn without_auth(self) -> Rank {
        Rank(self.0 & !Self::AUTH)
    }

    pub fn level(self) -> u8 {
        self.0 & Self::LEVEL_MASK
    }

    pub fn is_auth(self) -> bool {
        self.0 & Self::AUTH != 0
    }

    pub fn is_secure(self) -> bool {
        self.level() == Self::SECURE.0
    }

    pub fn is_insecure(self) -> bool {
        self.level() == Self::INSECURE.0
    }

    pub fn is_bogus(self) -> bool {
        self.level() == Self::BOGUS.0
    }

    /// Acceptance predicate: `candidate` clears this floor.
    pub fn accepts(self, candidate: Rank) -> bool {
        candidate.level() >= self.level() && (!self.is_auth() || candidate.is_auth())
    }
}

/// The lowest rank a request is willing to be served.
pub fn lowest_rank(qry: &QueryCtx) -> Rank {
    if qry.flags.nonauth {
        return Rank::INITIAL;
    }
    if qry.checking_disabled || qry.flags.stub {
        return Rank::INITIAL.with_auth();
    }
    match qry.trust_anchors {
        Some(ta) if ta.covers(&qry.qname) => Rank::INSECURE.with_auth(),
        _ => Rank::INITIAL.with_auth(),
    }
}

/// Remaining TTL of an entry at `now`. Negative means expired; with a
/// stale callback on the query, the callback decides (non-negative
/// return authorizes stale serving).
pub fn new_ttl(
    time: u32,
    ttl: u32,
    qry: Option<&QueryCtx>,
    owner: &crate::dns::Dname,
    rtype: crate::dns::RecordType,
    now: u64,
) -> i64 {
    let elapsed = now.saturating_sub(time as u64) as i64;
    let remaining = ttl as i64 - elapsed;
    if remaining < 0 {
        if let Some(cb) = qry.and_then(|q| q.stale_cb) {
            return cb(remaining, owner, rtype);
        }
    }
    remaining
}
