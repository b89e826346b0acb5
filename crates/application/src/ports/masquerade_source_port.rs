use fronting_domain::Masquerade;

/// A source of freshly vetted masquerades waiting to be written to the
/// persisted cache. Implemented by the pool itself; consumed by the cache
/// write-back job so that crate stays decoupled from the pool's concrete
/// queue types.
pub trait MasqueradeSourcePort: Send + Sync {
    /// Drains and returns every masquerade staged since the last call.
    fn drain_pending(&self) -> Vec<Masquerade>;
}
