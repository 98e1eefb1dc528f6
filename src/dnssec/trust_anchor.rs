use crate::dns::name::Dname;

/// Trust anchor store consulted by the rank floor policy. Key material and
/// validation live in the validator collaborator; the cache only needs to
/// know whether some anchor covers a name.
#[derive(Debug, Clone, Default)]
pub struct TrustAnchors {
    anchors: Vec<Dname>,
}

impl TrustAnchors {
    pub fn new() -> Self {
        Self::default()
    }

    /// The usual production configuration: one anchor at the root.
    pub fn with_root() -> Self {
        Self {
            anchors: vec![Dname::root()],
        }
    }

    pub fn add(&mut self, apex: Dname) {
        if !self.anchors.contains(&apex) {
            self.anchors.push(apex);
        }
    }

    pub fn remove(&mut self, apex: &Dname) {
        self.anchors.retain(|a| a != apex);
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Does any anchor sit at or above `name`?
    pub fn covers(&self, name: &Dname) -> bool {
        self.anchors.iter().any(|apex| name.is_under(apex))
    }
}
