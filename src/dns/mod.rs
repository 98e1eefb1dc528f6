pub mod enums;
pub mod name;
pub mod packet;
pub mod rdata;
pub mod rrset;

pub use enums::{Rcode, RecordClass, RecordType};
pub use name::Dname;
pub use packet::{Header, Packet, Question};
pub use rrset::{Record, RrSet};
