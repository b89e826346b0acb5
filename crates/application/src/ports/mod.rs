mod masquerade_cache_port;
mod masquerade_source_port;

pub use masquerade_cache_port::{CachePersistOutcome, MasqueradeCachePort};
pub use masquerade_source_port::MasqueradeSourcePort;
