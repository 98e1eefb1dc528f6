use super::enums::{RecordClass, RecordType};
use super::name::Dname;
use super::rdata;

/// One resource record with raw rdata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub owner: Dname,
    pub rtype: RecordType,
    pub rclass: RecordClass,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}

impl Record {
    pub fn new(owner: Dname, rtype: RecordType, ttl: u32, rdata: Vec<u8>) -> Self {
        Self {
            owner,
            rtype,
            rclass: RecordClass::IN,
            ttl,
            rdata,
        }
    }
}

/// A record set: all records sharing owner, class, and type, together with
/// the RRSIGs covering them. The set TTL is the minimum over data and
/// signature records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrSet {
    pub owner: Dname,
    pub rtype: RecordType,
    pub rclass: RecordClass,
    pub ttl: u32,
    pub rdatas: Vec<Vec<u8>>,
    pub sigs: Vec<Vec<u8>>,
}

impl RrSet {
    pub fn new(owner: Dname, rtype: RecordType, ttl: u32) -> Self {
        Self {
            owner,
            rtype,
            rclass: RecordClass::IN,
            ttl,
            rdatas: Vec::new(),
            sigs: Vec::new(),
        }
    }

    pub fn push_rdata(&mut self, rdata: Vec<u8>) {
        self.rdatas.push(rdata);
    }

    pub fn push_sig(&mut self, sig_rdata: Vec<u8>) {
        self.sigs.push(sig_rdata);
    }

    pub fn is_empty(&self) -> bool {
        self.rdatas.is_empty()
    }

    /// The same set under a different owner (wildcard expansion).
    pub fn with_owner(&self, owner: Dname) -> RrSet {
        RrSet {
            owner,
            ..self.clone()
        }
    }

    /// Data records for a packet section.
    pub fn to_records(&self) -> Vec<Record> {
        self.rdatas
            .iter()
            .map(|rdata| Record {
                owner: self.owner.clone(),
                rtype: self.rtype,
                rclass: self.rclass,
                ttl: self.ttl,
                rdata: rdata.clone(),
            })
            .collect()
    }

    /// Covering RRSIG records, sharing the set TTL.
    pub fn sig_records(&self) -> Vec<Record> {
        self.sigs
            .iter()
            .map(|rdata| Record {
                owner: self.owner.clone(),
                rtype: RecordType::RRSIG,
                rclass: self.rclass,
                ttl: self.ttl,
                rdata: rdata.clone(),
            })
            .collect()
    }
}

/// Group one packet section into record sets, attaching RRSIGs to the set
/// they cover. Bare RRSIGs (covering nothing present) and OPT records are
/// dropped; they are not cacheable on their own.
pub fn group_section(records: &[Record]) -> Vec<RrSet> {
    let mut sets: Vec<RrSet> = Vec::new();

    for rec in records {
        if rec.rtype == RecordType::RRSIG || rec.rtype == RecordType::OPT {
            continue;
        }
        match sets
            .iter_mut()
            .find(|s| s.rtype == rec.rtype && s.owner == rec.owner)
        {
            Some(set) => {
                set.ttl = set.ttl.min(rec.ttl);
                set.push_rdata(rec.rdata.clone());
            }
            None => {
                let mut set = RrSet::new(rec.owner.clone(), rec.rtype, rec.ttl);
                set.rclass = rec.rclass;
                set.push_rdata(rec.rdata.clone());
                sets.push(set);
            }
        }
    }

    for rec in records {
        if rec.rtype != RecordType::RRSIG {
            continue;
        }
        let Some(covered) = rdata::rrsig_type_covered(&rec.rdata) else {
            continue;
        };
        if let Some(set) = sets
            .iter_mut()
            .find(|s| s.rtype == covered && s.owner == rec.owner)
        {
            set.ttl = set.ttl.min(rec.ttl);
            set.push_sig(rec.rdata.clone());
        }
    }

    sets
}
