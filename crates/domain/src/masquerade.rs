use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate (front domain, front IP) pair the dialer can use to reach a
/// CDN edge. `domain` and `ip` are immutable once constructed; `last_vetted`
/// is the only field that changes over the record's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Masquerade {
    domain: String,
    ip: IpAddr,
    #[serde(default)]
    last_vetted: Option<DateTime<Utc>>,
}

impl Masquerade {
    pub fn new(domain: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            domain: domain.into(),
            ip,
            last_vetted: None,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn last_vetted(&self) -> Option<DateTime<Utc>> {
        self.last_vetted
    }

    /// Timestamp used for total ordering in eviction/age comparisons. A
    /// never-vetted masquerade sorts as the oldest possible entry.
    pub fn vetted_at(&self) -> DateTime<Utc> {
        self.last_vetted.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn mark_vetted(&mut self, at: DateTime<Utc>) {
        self.last_vetted = Some(at);
    }

    pub fn is_vetted(&self) -> bool {
        self.last_vetted.is_some()
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.vetted_at()
    }
}
