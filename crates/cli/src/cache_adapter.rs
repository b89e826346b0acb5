use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fronting_application::{CachePersistOutcome, MasqueradeCachePort};
use fronting_domain::{FrontingError, Masquerade};
use tokio::sync::Mutex;

/// A JSON-file backed `MasqueradeCachePort`. The wire format here is a demo
/// concern — the pool only ever depends on the trait, so swapping in a
/// database or object-store adapter never touches the infrastructure crate.
pub struct JsonFileCache {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            lock: Mutex::new(()),
        })
    }

    fn read_all(&self) -> Vec<Masquerade> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str(&contents).unwrap_or_default()
    }

    fn write_all(&self, entries: &[Masquerade]) -> std::io::Result<()> {
        let rendered = serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_string());
        std::fs::write(&self.path, rendered)
    }
}

#[async_trait]
impl MasqueradeCachePort for JsonFileCache {
    async fn load(
        &self,
        now: DateTime<Utc>,
        max_age: chrono::Duration,
    ) -> Result<Vec<Masquerade>, FrontingError> {
        let _guard = self.lock.lock().await;
        let entries = self
            .read_all()
            .into_iter()
            .filter(|m| m.age(now) <= max_age)
            .collect();
        Ok(entries)
    }

    async fn persist(
        &self,
        batch: Vec<Masquerade>,
        max_entries: usize,
    ) -> Result<CachePersistOutcome, FrontingError> {
        let _guard = self.lock.lock().await;
        let mut merged = self.read_all();
        let written = batch.len();

        for incoming in batch {
            if let Some(existing) = merged
                .iter_mut()
                .find(|m| m.domain() == incoming.domain() && m.ip() == incoming.ip())
            {
                *existing = incoming;
            } else {
                merged.push(incoming);
            }
        }

        merged.sort_by_key(|m| m.vetted_at());
        let evicted = merged.len().saturating_sub(max_entries);
        if evicted > 0 {
            merged.drain(0..evicted);
        }

        self.write_all(&merged)
            .map_err(|e| FrontingError::Config(fronting_domain::config::ConfigError::FileWrite(
                self.path.display().to_string(),
                e.to_string(),
            )))?;

        Ok(CachePersistOutcome { written, evicted })
    }
}
