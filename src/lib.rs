pub mod cache;
pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod query;

pub use cache::backend::{Backend, MemBackend, SledBackend};
pub use cache::rank::Rank;
pub use cache::{Cache, CacheStats};
pub use config::CacheConfig;
pub use dns::packet::Packet;
pub use error::{MimirError, Result};
pub use query::{QueryCtx, QueryState};
