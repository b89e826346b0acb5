use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fronting_domain::{FrontingError, Masquerade};

/// Outcome of a single cache write-back batch.
#[derive(Debug, Default, Clone)]
pub struct CachePersistOutcome {
    /// Number of masquerades submitted in this batch.
    pub written: usize,
    /// Number of entries evicted from the store to stay within `max_entries`.
    pub evicted: usize,
}

/// Persisted store for vetted masquerades, consulted on startup (to seed
/// the vetted queue without re-vetting) and written to periodically by the
/// cache write-back job. Implementations decide the storage format and
/// location; the core only ever sees `Masquerade` values.
#[async_trait]
pub trait MasqueradeCachePort: Send + Sync {
    /// Load previously vetted masquerades no older than `max_age`, relative
    /// to `now`. Implementations should silently drop malformed or
    /// unreadable entries rather than failing the whole load.
    async fn load(
        &self,
        now: DateTime<Utc>,
        max_age: chrono::Duration,
    ) -> Result<Vec<Masquerade>, FrontingError>;

    /// Persist `batch`, merging with whatever is already stored and
    /// evicting the oldest-by-`last_vetted` entries past `max_entries`.
    async fn persist(
        &self,
        batch: Vec<Masquerade>,
        max_entries: usize,
    ) -> Result<CachePersistOutcome, FrontingError>;
}
