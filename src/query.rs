use crate::cache::rank::Rank;
use crate::dns::{Dname, RecordClass, RecordType};
use crate::dnssec::TrustAnchors;

/// Where a sub-query stands in the resolution pipeline. `peek` either
/// finishes the query (`Done`) or hands back the state it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryState {
    Initial,
    #[default]
    Produce,
    Done,
    Fail,
}

/// Query-scoped serve-stale hook. Receives the (negative) remaining TTL,
/// the owner, and the type; returning a non-negative value authorizes
/// serving the record with that TTL.
pub type StaleCallback<'a> = &'a dyn Fn(i64, &Dname, RecordType) -> i64;

#[derive(Debug, Clone, Default)]
pub struct QueryFlags {
    /// Bypass the cache for this query entirely.
    pub no_cache: bool,
    /// The answer was served from cache.
    pub cached: bool,
    /// Stop qname minimization; the cache answered at full name.
    pub no_minimize: bool,
    /// Some served record had 5 s or less left to live.
    pub expiring: bool,
    /// Validation requested for this query.
    pub dnssec_want: bool,
    /// The answer is in a proven insecure zone.
    pub dnssec_insecure: bool,
    /// Fetch that does not require authoritative data (glue).
    pub nonauth: bool,
    /// Forwarding in stub mode; upstream validates.
    pub stub: bool,
    /// The cache was already consulted for this query.
    pub tried_cache: bool,
}

/// Per-sub-query context shared by peek and stash. One is built for each
/// iteration step; the stale callback and trust-anchor view borrow from
/// the enclosing request.
pub struct QueryCtx<'a> {
    pub qname: Dname,
    pub qtype: RecordType,
    pub qclass: RecordClass,
    /// CD bit from the client request.
    pub checking_disabled: bool,
    pub state: QueryState,
    pub flags: QueryFlags,
    /// Wall-clock seconds used for all TTL arithmetic in this step.
    pub now: u64,
    /// Rank the validator assigned to answer-section records.
    pub answer_rank: Rank,
    /// Rank the validator assigned to authority-section records.
    pub auth_rank: Rank,
    pub stale_cb: Option<StaleCallback<'a>>,
    pub trust_anchors: Option<&'a TrustAnchors>,
}

impl<'a> QueryCtx<'a> {
    pub fn new(qname: Dname, qtype: RecordType, now: u64) -> Self {
        Self {
            qname,
            qtype,
            qclass: RecordClass::IN,
            checking_disabled: false,
            state: QueryState::Produce,
            flags: QueryFlags::default(),
            now,
            answer_rank: Rank::INITIAL.with_auth(),
            auth_rank: Rank::INITIAL.with_auth(),
            stale_cb: None,
            trust_anchors: None,
        }
    }
}
