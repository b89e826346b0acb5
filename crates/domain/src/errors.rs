use thiserror::Error;

/// Errors surfaced by the public fronting API.
///
/// Per-masquerade dial faults (certificate/handshake failures, timeouts,
/// bad statuses) are classified internally as `DialFault` and drive the
/// retry loop; they are logged, never wrapped into this type. Only two
/// failures ever escape a `round_trip` call: the pool ran dry, or every
/// attempt in the budget was spent. `RequestUnsuccessful` covers the one
/// remaining externally-visible case that isn't a retry-loop decision at
/// all — the response body failing to buffer after a masquerade already
/// succeeded.
#[derive(Error, Debug)]
pub enum FrontingError {
    #[error("no masquerades available in candidate or vetted queues")]
    NoMasqueradesAvailable,

    #[error("request unsuccessful: {0}")]
    RequestUnsuccessful(String),

    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("timed out waiting for the fronting pool to become available")]
    ConfigurationUnavailable,

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}
