//! Infrastructure layer: the masquerade pool itself — queues, TLS dialing,
//! vetting, the request engine, and the configuration facade that ties
//! them together and publishes a handle for `new_direct` to find.
pub mod candidate_loader;
pub mod dialer;
pub mod facade;
pub mod http;
pub mod idle_timeout;
pub mod pool;
pub mod queue;
pub mod tls;
pub mod vetter;

pub use dialer::{DialFault, Dialer};
pub use facade::{close_cache, configure, new_direct, Fronting};
pub use http::{RequestEngine, RequestEngineError};
pub use pool::{PoolState, Tier};
pub use queue::BoundedQueue;
pub use tls::TlsConfigCache;
