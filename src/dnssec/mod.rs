pub mod trust_anchor;

pub use trust_anchor::TrustAnchors;
