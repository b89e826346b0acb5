//! Application layer: ports the infrastructure and jobs crates implement,
//! and the core depends on only through these traits.
pub mod ports;

pub use ports::{CachePersistOutcome, MasqueradeCachePort, MasqueradeSourcePort};
