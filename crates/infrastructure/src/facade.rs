use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use fronting_application::MasqueradeCachePort;
use fronting_domain::{Config, FrontingError, Masquerade};
use fronting_jobs::CacheWriteBackJob;
use tokio::sync::{Notify, RwLock};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::candidate_loader::load_candidates;
use crate::http::RequestEngine;
use crate::pool::PoolState;
use crate::vetter::run_vetting_pool;

/// The published handle returned by `configure` and looked up by
/// `new_direct`. Owns the pool, the request engine built on top of it, and
/// the cancellation token that stops the background cache write-back job
/// when a later `configure` call (or an explicit `close_cache`) supersedes
/// it.
pub struct Fronting {
    pool: Arc<PoolState>,
    engine: RequestEngine,
    shutdown: CancellationToken,
}

impl Fronting {
    pub async fn round_trip(
        &self,
        request: &http::Request<Bytes>,
    ) -> Result<http::Response<Bytes>, FrontingError> {
        self.engine.round_trip(request).await
    }

    pub fn pool(&self) -> &Arc<PoolState> {
        &self.pool
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

struct GlobalState {
    current: RwLock<Option<Arc<Fronting>>>,
    notify: Notify,
}

fn global() -> &'static GlobalState {
    static STATE: OnceLock<GlobalState> = OnceLock::new();
    STATE.get_or_init(|| GlobalState {
        current: RwLock::new(None),
        notify: Notify::new(),
    })
}

/// Builds a new pool from `config` and `candidates_by_provider`, optionally
/// seeding the vetted tier from `cache` to cut down on first-run vetting,
/// starts the vetter and the cache write-back job, and publishes the
/// result. Idempotent: any previously published instance (and its
/// background cache job) is shut down first, so reconfiguring never leaves
/// two pools running against the same global handle.
///
/// If the flattened candidate total is empty, configuration fails silently
/// (logged) and `None` is returned; whatever instance was previously
/// published, if any, is left running untouched.
pub async fn configure(
    config: Config,
    candidates_by_provider: HashMap<String, Vec<Masquerade>>,
    cache: Option<Arc<dyn MasqueradeCachePort>>,
) -> Option<Arc<Fronting>> {
    let total_candidates: usize = candidates_by_provider.values().map(Vec::len).sum();
    if total_candidates == 0 {
        tracing::warn!("configure called with no masquerades across all providers, ignoring");
        return None;
    }

    let state = global();

    if let Some(previous) = state.current.write().await.take() {
        previous.shutdown_token().cancel();
    }

    let now = Utc::now();
    let max_age = chrono::Duration::seconds(config.cache.max_age_secs as i64);

    let mut restored = Vec::new();
    if let Some(cache) = &cache {
        match cache.load(now, max_age).await {
            Ok(entries) => restored = entries,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load masquerade cache, starting cold");
            }
        }
    }

    let candidates = load_candidates(candidates_by_provider);
    let to_vet = config.vet_initially.saturating_sub(restored.len());

    let candidate_capacity = candidates.len().max(1);
    // Sized from what was actually restored, not just `vet_initially` — a
    // larger persisted cache than the configured vet count must not be
    // truncated away on startup.
    let vetted_capacity = restored.len().max(config.vet_initially).max(1);
    let pool = Arc::new(PoolState::new(
        config.clone(),
        candidates,
        restored,
        candidate_capacity,
        vetted_capacity,
        config.cache.max_entries,
    ));

    let shutdown = CancellationToken::new();

    if to_vet > 0 {
        let vetting_pool = pool.clone();
        let worker_count = to_vet.min(1000);
        tokio::spawn(async move {
            run_vetting_pool(vetting_pool, worker_count).await;
        });
    }

    if let Some(cache) = cache {
        let job = Arc::new(
            CacheWriteBackJob::new(pool.clone(), cache, config.cache.max_entries)
                .with_write_interval_secs(config.cache.write_interval_secs)
                .with_cancellation(shutdown.clone()),
        );
        job.start().await;
    }

    let engine = RequestEngine::new(pool.clone());
    let fronting = Arc::new(Fronting {
        pool,
        engine,
        shutdown,
    });

    *state.current.write().await = Some(fronting.clone());
    state.notify.notify_waiters();
    info!("fronting pool configured");
    Some(fronting)
}

/// Returns the currently published instance, waiting up to `wait` for a
/// concurrent `configure` call to finish if none is published yet.
pub async fn new_direct(wait: Duration) -> Result<Arc<Fronting>, FrontingError> {
    let state = global();
    if let Some(existing) = state.current.read().await.clone() {
        return Ok(existing);
    }

    timeout(wait, async {
        loop {
            if let Some(existing) = state.current.read().await.clone() {
                return existing;
            }
            state.notify.notified().await;
        }
    })
    .await
    .map_err(|_| FrontingError::ConfigurationUnavailable)
}

/// Shuts down the published instance's background cache write-back job
/// (flushing any staged masquerades first) without publishing a new one.
/// The instance itself stays published — `new_direct` keeps returning it,
/// and it keeps serving requests — only its cache job stops.
pub async fn close_cache() {
    let state = global();
    if let Some(fronting) = state.current.read().await.as_ref() {
        fronting.shutdown_token().cancel();
    }
}
