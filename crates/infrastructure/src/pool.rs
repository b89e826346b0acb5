use std::sync::Arc;

use chrono::Utc;
use fronting_domain::{Config, Masquerade};

use crate::dialer::{DialFault, Dialer};
use crate::queue::BoundedQueue;
use crate::tls::TlsConfigCache;

/// Which queue a masquerade was popped from, so a failed attempt can be
/// requeued to the same tier it came from rather than leaking between tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Candidate,
    Vetted,
}

/// Shared pool state: the two masquerade queues, the cache write-back
/// staging queue, and the TLS config cache every dialed connection draws
/// from. Cloned cheaply (`Arc` fields only) so infrastructure, jobs, and
/// the facade can each hold a handle.
pub struct PoolState {
    candidates: BoundedQueue<Masquerade>,
    vetted: BoundedQueue<Masquerade>,
    to_cache: BoundedQueue<Masquerade>,
    pub tls_cache: Arc<TlsConfigCache>,
    pub dialer: Dialer,
    pub config: Config,
}

impl PoolState {
    pub fn new(
        config: Config,
        candidates: Vec<Masquerade>,
        vetted: Vec<Masquerade>,
        candidate_capacity: usize,
        vetted_capacity: usize,
        to_cache_capacity: usize,
    ) -> Self {
        let tls_cache = Arc::new(TlsConfigCache::new());
        let dialer = Dialer::new(tls_cache.clone(), config.dial_timeout(), config.idle_timeout());

        Self::with_dialer(config, candidates, vetted, candidate_capacity, vetted_capacity, to_cache_capacity, tls_cache, dialer)
    }

    /// Same as `new`, but with an explicit `tls_cache`/`dialer` pair instead
    /// of building the real public-CA dialer. Only meant for pointing tests
    /// at a local listener with a test-only trust root and port.
    #[doc(hidden)]
    #[allow(clippy::too_many_arguments)]
    pub fn with_dialer(
        config: Config,
        candidates: Vec<Masquerade>,
        vetted: Vec<Masquerade>,
        candidate_capacity: usize,
        vetted_capacity: usize,
        to_cache_capacity: usize,
        tls_cache: Arc<TlsConfigCache>,
        dialer: Dialer,
    ) -> Self {
        Self {
            candidates: BoundedQueue::with_items(candidate_capacity, candidates),
            vetted: BoundedQueue::with_items(vetted_capacity, vetted),
            to_cache: BoundedQueue::new(to_cache_capacity),
            tls_cache,
            dialer,
            config,
        }
    }

    /// Pops a masquerade preferring the vetted tier, falling back to
    /// candidates. Returns which tier it came from so callers can requeue
    /// correctly on failure.
    pub fn pop_preferred(&self) -> Option<(Masquerade, Tier)> {
        self.pop_for_tier(Tier::Vetted)
    }

    /// Pops from `preferred` first, falling back to `candidates` if
    /// `preferred` is empty (a no-op fallback when `preferred` already is
    /// `Candidate`). Mirrors §4.4's shared `dial()`/`dialWith(queue)`
    /// algorithm, where the only difference between the two call sites is
    /// which queue is tried first.
    pub fn pop_for_tier(&self, preferred: Tier) -> Option<(Masquerade, Tier)> {
        let primary = match preferred {
            Tier::Vetted => self.vetted.try_pop().map(|m| (m, Tier::Vetted)),
            Tier::Candidate => self.candidates.try_pop().map(|m| (m, Tier::Candidate)),
        };
        primary.or_else(|| self.candidates.try_pop().map(|m| (m, Tier::Candidate)))
    }

    /// Pops strictly from the candidate tier (used by the vetter, which
    /// only ever vets unvetted candidates).
    pub fn pop_candidate(&self) -> Option<Masquerade> {
        self.candidates.try_pop()
    }

    pub fn requeue(&self, masquerade: Masquerade, tier: Tier) {
        match tier {
            Tier::Candidate => {
                self.candidates.try_push(masquerade);
            }
            Tier::Vetted => {
                self.vetted.try_push(masquerade);
            }
        }
    }

    /// Marks a masquerade vetted, moves it into the vetted tier, and stages
    /// it for the next cache write-back batch. Overflow on either queue is
    /// silently dropped (backpressure by discard, matching the cache
    /// write-back queue's stated overflow semantics).
    pub fn promote(&self, mut masquerade: Masquerade) {
        masquerade.mark_vetted(Utc::now());
        self.to_cache.try_push(masquerade.clone());
        self.vetted.try_push(masquerade);
    }

    pub fn classify_and_route(&self, masquerade: Masquerade, tier: Tier, fault: &DialFault) {
        match fault {
            DialFault::Permanent(_) => {
                // discarded: never requeued
            }
            DialFault::Transient(_) => self.requeue(masquerade, tier),
        }
    }

    pub fn drain_to_cache(&self) -> Vec<Masquerade> {
        self.to_cache.drain_all()
    }

    pub fn candidate_len(&self) -> usize {
        self.candidates.len()
    }

    pub fn vetted_len(&self) -> usize {
        self.vetted.len()
    }
}

impl fronting_application::MasqueradeSourcePort for PoolState {
    fn drain_pending(&self) -> Vec<Masquerade> {
        self.drain_to_cache()
    }
}
