use bytes::{BufMut, BytesMut};
use smallvec::SmallVec;

use super::enums::{Rcode, RecordClass, RecordType};
use super::name::Dname;
use super::rrset::Record;
use crate::error::{MimirError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub ad: bool,
    pub cd: bool,
    pub rcode: Rcode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub qname: Dname,
    pub qtype: RecordType,
    pub qclass: RecordClass,
}

/// A DNS message as the cache layer sees it: one question and three
/// record sections. Encoding is uncompressed; decoding tolerates
/// compression pointers.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    pub header: Header,
    pub question: Option<Question>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub additionals: Vec<Record>,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(qname: Dname, qtype: RecordType) -> Self {
        let mut pkt = Self::new();
        pkt.header.rd = true;
        pkt.question = Some(Question {
            qname,
            qtype,
            qclass: RecordClass::IN,
        });
        pkt
    }

    /// Reset the message for a fresh answer to (qname, qtype), keeping the id.
    pub fn renew(&mut self, qname: Dname, qtype: RecordType) {
        self.header.qr = true;
        self.header.rcode = Rcode::NoError;
        self.question = Some(Question {
            qname,
            qtype,
            qclass: RecordClass::IN,
        });
        self.answers.clear();
        self.authorities.clear();
        self.additionals.clear();
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.answers
            .iter()
            .chain(self.authorities.iter())
            .chain(self.additionals.iter())
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        self.answers
            .iter_mut()
            .chain(self.authorities.iter_mut())
            .chain(self.additionals.iter_mut())
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(512);
        buf.put_u16(self.header.id);
        let mut b1 = 0u8;
        if self.header.qr {
            b1 |= 0x80;
        }
        b1 |= (self.header.opcode & 0x0f) << 3;
        if self.header.aa {
            b1 |= 0x04;
        }
        if self.header.tc {
            b1 |= 0x02;
        }
        if self.header.rd {
            b1 |= 0x01;
        }
        let mut b2 = self.header.rcode.to_u8() & 0x0f;
        if self.header.ra {
            b2 |= 0x80;
        }
        if self.header.ad {
            b2 |= 0x20;
        }
        if self.header.cd {
            b2 |= 0x10;
        }
        buf.put_u8(b1);
        buf.put_u8(b2);
        buf.put_u16(self.question.is_some() as u16);
        buf.put_u16(self.answers.len() as u16);
        buf.put_u16(self.authorities.len() as u16);
        buf.put_u16(self.additionals.len() as u16);

        if let Some(q) = &self.question {
            buf.put_slice(q.qname.wire());
            buf.put_u16(q.qtype.to_u16());
            buf.put_u16(q.qclass.to_u16());
        }
        for rec in self.records() {
            buf.put_slice(rec.owner.wire());
            buf.put_u16(rec.rtype.to_u16());
            buf.put_u16(rec.rclass.to_u16());
            buf.put_u32(rec.ttl);
            buf.put_u16(rec.rdata.len() as u16);
            buf.put_slice(&rec.rdata);
        }
        buf.to_vec()
    }

    pub fn from_wire(wire: &[u8]) -> Result<Packet> {
        if wire.len() < 12 {
            return Err(MimirError::Corrupt("packet shorter than header"));
        }
        let mut pkt = Packet::new();
        pkt.header.id = u16::from_be_bytes([wire[0], wire[1]]);
        let (b1, b2) = (wire[2], wire[3]);
        pkt.header.qr = b1 & 0x80 != 0;
        pkt.header.opcode = (b1 >> 3) & 0x0f;
        pkt.header.aa = b1 & 0x04 != 0;
        pkt.header.tc = b1 & 0x02 != 0;
        pkt.header.rd = b1 & 0x01 != 0;
        pkt.header.ra = b2 & 0x80 != 0;
        pkt.header.ad = b2 & 0x20 != 0;
        pkt.header.cd = b2 & 0x10 != 0;
        pkt.header.rcode = Rcode::from_u8(b2 & 0x0f);

        let qdcount = u16::from_be_bytes([wire[4], wire[5]]);
        let ancount = u16::from_be_bytes([wire[6], wire[7]]);
        let nscount = u16::from_be_bytes([wire[8], wire[9]]);
        let arcount = u16::from_be_bytes([wire[10], wire[11]]);

        let mut pos = 12;
        for _ in 0..qdcount {
            let (qname, next) = read_name(wire, pos)?;
            pos = next;
            if pos + 4 > wire.len() {
                return Err(MimirError::Corrupt("truncated question"));
            }
            let qtype = RecordType::from_u16(u16::from_be_bytes([wire[pos], wire[pos + 1]]));
            let qclass = RecordClass::from_u16(u16::from_be_bytes([wire[pos + 2], wire[pos + 3]]));
            pos += 4;
            pkt.question = Some(Question {
                qname,
                qtype,
                qclass,
            });
        }
        pkt.answers = read_section(wire, &mut pos, ancount)?;
        pkt.authorities = read_section(wire, &mut pos, nscount)?;
        pkt.additionals = read_section(wire, &mut pos, arcount)?;
        Ok(pkt)
    }
}

fn read_section(wire: &[u8], pos: &mut usize, count: u16) -> Result<Vec<Record>> {
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (rec, next) = read_record(wire, *pos)?;
        *pos = next;
        records.push(rec);
    }
    Ok(records)
}

fn read_record(wire: &[u8], pos: usize) -> Result<(Record, usize)> {
    let (owner, mut pos) = read_name(wire, pos)?;
    if pos + 10 > wire.len() {
        return Err(MimirError::Corrupt("truncated record header"));
    }
    let rtype = RecordType::from_u16(u16::from_be_bytes([wire[pos], wire[pos + 1]]));
    let rclass = RecordClass::from_u16(u16::from_be_bytes([wire[pos + 2], wire[pos + 3]]));
    let ttl = u32::from_be_bytes([wire[pos + 4], wire[pos + 5], wire[pos + 6], wire[pos + 7]]);
    let rdlen = u16::from_be_bytes([wire[pos + 8], wire[pos + 9]]) as usize;
    pos += 10;
    if pos + rdlen > wire.len() {
        return Err(MimirError::Corrupt("truncated rdata"));
    }
    let rdata = wire[pos..pos + rdlen].to_vec();
    pos += rdlen;
    Ok((
        Record {
            owner,
            rtype,
            rclass,
            ttl,
            rdata,
        },
        pos,
    ))
}

/// Read a possibly-compressed name; returns the position after the name
/// as it appears at `start` (pointers are followed, not re-entered).
fn read_name(wire: &[u8], start: usize) -> Result<(Dname, usize)> {
    let mut labels: SmallVec<[&[u8]; 8]> = SmallVec::new();
    let mut pos = start;
    let mut end = None;
    let mut jumps = 0;
    loop {
        let len = *wire
            .get(pos)
            .ok_or(MimirError::Corrupt("truncated name"))? as usize;
        if len == 0 {
            end.get_or_insert(pos + 1);
            break;
        }
        if len & 0xc0 == 0xc0 {
            let low = *wire
                .get(pos + 1)
                .ok_or(MimirError::Corrupt("truncated pointer"))? as usize;
            end.get_or_insert(pos + 2);
            pos = ((len & 0x3f) << 8) | low;
            jumps += 1;
            if jumps > 64 {
                return Err(MimirError::Corrupt("compression pointer loop"));
            }
            continue;
        }
        if len > 63 || pos + 1 + len > wire.len() {
            return Err(MimirError::Corrupt("bad label length"));
        }
        labels.push(&wire[pos + 1..pos + 1 + len]);
        pos += 1 + len;
    }
    let name = Dname::from_labels(labels.iter().copied())
        .map_err(|_| MimirError::Corrupt("invalid name in packet"))?;
    Ok((name, end.unwrap_or(pos)))
}
