use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::{MimirError, Result};

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_LABEL_LEN: usize = 63;

/// A validated, lowercased DNS owner name in uncompressed wire form
/// (length-prefixed labels, terminating root byte).
///
/// Case folding happens at construction so that equality, hashing, and the
/// lookup-format encoding all operate on one canonical spelling.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Dname {
    wire: Vec<u8>,
}

impl Dname {
    pub fn root() -> Self {
        Self { wire: vec![0] }
    }

    /// Build from raw label slices, leftmost label first.
    pub fn from_labels<'a, I>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut wire = Vec::with_capacity(32);
        for label in labels {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(MimirError::InvalidName(format!(
                    "label length {} out of range",
                    label.len()
                )));
            }
            wire.push(label.len() as u8);
            wire.extend(label.iter().map(|b| b.to_ascii_lowercase()));
        }
        wire.push(0);
        if wire.len() > MAX_NAME_LEN {
            return Err(MimirError::InvalidName(format!(
                "name length {} exceeds {}",
                wire.len(),
                MAX_NAME_LEN
            )));
        }
        Ok(Self { wire })
    }

    /// Uncompressed wire representation, terminating root byte included.
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn is_root(&self) -> bool {
        self.wire.len() == 1
    }

    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    pub fn labels(&self) -> LabelIter<'_> {
        LabelIter {
            wire: &self.wire,
            pos: 0,
        }
    }

    /// True when any label contains a zero byte. Such names cannot be
    /// represented unambiguously in the cache key space and are rejected
    /// at insert and lookup time.
    pub fn has_null_label_byte(&self) -> bool {
        self.labels().any(|l| l.contains(&0))
    }

    pub fn is_wildcard(&self) -> bool {
        self.labels().next() == Some(b"*".as_slice())
    }

    /// The name with its leftmost label removed; None at the root.
    pub fn parent(&self) -> Option<Dname> {
        if self.is_root() {
            return None;
        }
        let skip = 1 + self.wire[0] as usize;
        Some(Dname {
            wire: self.wire[skip..].to_vec(),
        })
    }

    /// Drop `n` leading labels. None when the name has fewer than `n`.
    pub fn strip_labels(&self, n: usize) -> Option<Dname> {
        let mut name = self.clone();
        for _ in 0..n {
            name = name.parent()?;
        }
        Some(name)
    }

    /// Prefix one label, e.g. composing the source of synthesis `*.encloser`.
    pub fn prepend_label(&self, label: &[u8]) -> Result<Dname> {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(MimirError::InvalidName(format!(
                "label length {} out of range",
                label.len()
            )));
        }
        let mut wire = Vec::with_capacity(1 + label.len() + self.wire.len());
        wire.push(label.len() as u8);
        wire.extend(label.iter().map(|b| b.to_ascii_lowercase()));
        wire.extend_from_slice(&self.wire);
        if wire.len() > MAX_NAME_LEN {
            return Err(MimirError::InvalidName("name too long".into()));
        }
        Ok(Dname { wire })
    }

    /// Ancestor-or-self test: does `self` end in all of `zone`'s labels?
    pub fn is_under(&self, zone: &Dname) -> bool {
        let mine: SmallVec<[&[u8]; 8]> = self.labels().collect();
        let theirs: SmallVec<[&[u8]; 8]> = zone.labels().collect();
        if theirs.len() > mine.len() {
            return false;
        }
        mine.iter()
            .rev()
            .zip(theirs.iter().rev())
            .all(|(a, b)| a == b)
    }

    /// Number of trailing labels shared with `other`.
    pub fn common_label_suffix(&self, other: &Dname) -> usize {
        let mine: SmallVec<[&[u8]; 8]> = self.labels().collect();
        let theirs: SmallVec<[&[u8]; 8]> = other.labels().collect();
        mine.iter()
            .rev()
            .zip(theirs.iter().rev())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Append the lookup-format encoding: labels in reverse order, each
    /// preceded by its length. The root encodes as nothing.
    pub fn write_lf(&self, out: &mut Vec<u8>) {
        let labels: SmallVec<[&[u8]; 8]> = self.labels().collect();
        for label in labels.iter().rev() {
            out.push(label.len() as u8);
            out.extend_from_slice(label);
        }
    }

    /// Rebuild a name from its lookup-format encoding.
    pub fn from_lf(lf: &[u8]) -> Result<Dname> {
        let mut labels: SmallVec<[&[u8]; 8]> = SmallVec::new();
        let mut pos = 0;
        while pos < lf.len() {
            let len = lf[pos] as usize;
            pos += 1;
            if len == 0 || pos + len > lf.len() {
                return Err(MimirError::Corrupt("malformed lookup-format name"));
            }
            labels.push(&lf[pos..pos + len]);
            pos += len;
        }
        labels.reverse();
        Dname::from_labels(labels.iter().copied())
    }
}

pub struct LabelIter<'a> {
    wire: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for LabelIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let len = *self.wire.get(self.pos)? as usize;
        if len == 0 {
            return None;
        }
        let start = self.pos + 1;
        self.pos = start + len;
        self.wire.get(start..start + len)
    }
}

impl FromStr for Dname {
    type Err = MimirError;

    fn from_str(s: &str) -> Result<Dname> {
        let trimmed = s.strip_suffix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(Dname::root());
        }
        Dname::from_labels(trimmed.split('.').map(|l| l.as_bytes()))
    }
}

impl fmt::Display for Dname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, ".");
        }
        for label in self.labels() {
            for &b in label {
                if b.is_ascii_graphic() && b != b'.' {
                    write!(f, "{}", b as char)?;
                } else {
                    write!(f, "\\{:03}", b)?;
                }
            }
            write!(f, ".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Dname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dname({})", self)
    }
}
