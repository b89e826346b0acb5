use std::sync::Arc;
use std::time::Duration;

use fronting_application::{MasqueradeCachePort, MasqueradeSourcePort};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const DEFAULT_WRITE_INTERVAL_SECS: u64 = 5;

/// Periodically drains masquerades staged by the pool since the last tick
/// and writes them to the persisted cache, coalescing whatever accumulated
/// during the interval into a single batch. Runs until cancelled, flushing
/// one last time before exiting so nothing staged just before shutdown is
/// lost.
pub struct CacheWriteBackJob {
    source: Arc<dyn MasqueradeSourcePort>,
    cache: Arc<dyn MasqueradeCachePort>,
    write_interval_secs: u64,
    max_entries: usize,
    shutdown: CancellationToken,
}

impl CacheWriteBackJob {
    pub fn new(
        source: Arc<dyn MasqueradeSourcePort>,
        cache: Arc<dyn MasqueradeCachePort>,
        max_entries: usize,
    ) -> Self {
        Self {
            source,
            cache,
            write_interval_secs: DEFAULT_WRITE_INTERVAL_SECS,
            max_entries,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_write_interval_secs(mut self, secs: u64) -> Self {
        self.write_interval_secs = secs;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn start(self: Arc<Self>) {
        info!(
            interval_secs = self.write_interval_secs,
            "starting cache write-back job"
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(self.write_interval_secs));
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        self.flush().await;
                        info!("cache write-back job shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        self.flush().await;
                    }
                }
            }
        });
    }

    async fn flush(&self) {
        let batch = self.source.drain_pending();
        if batch.is_empty() {
            return;
        }
        match self.cache.persist(batch, self.max_entries).await {
            Ok(outcome) => {
                if outcome.written > 0 || outcome.evicted > 0 {
                    info!(
                        written = outcome.written,
                        evicted = outcome.evicted,
                        "cache write-back batch persisted"
                    );
                }
            }
            Err(e) => error!(error = %e, "cache write-back batch failed"),
        }
    }
}
