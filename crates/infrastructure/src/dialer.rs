use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fronting_domain::{FrontingError, Masquerade};
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::idle_timeout::IdleTimeout;
use crate::pool::{PoolState, Tier};
use crate::tls::TlsConfigCache;

const FRONT_TLS_PORT: u16 = 443;

/// A dial attempt's classified failure. Permanent faults mean the
/// masquerade itself is broken (bad cert, handshake rejection) and must
/// never be requeued; transient faults (timeouts, resets) are requeued to
/// their source tier so a later attempt can try again.
#[derive(Debug)]
pub enum DialFault {
    Permanent(String),
    Transient(String),
}

impl std::fmt::Display for DialFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialFault::Permanent(reason) => write!(f, "permanent: {reason}"),
            DialFault::Transient(reason) => write!(f, "transient: {reason}"),
        }
    }
}

pub type DialedStream = IdleTimeout<TlsStream<TcpStream>>;

/// Dials a masquerade's IP over TCP then TLS with SNI suppressed, verifying
/// the certificate against the masquerade's front domain regardless.
pub struct Dialer {
    tls_cache: Arc<TlsConfigCache>,
    dial_timeout: Duration,
    idle_timeout: Duration,
    port: u16,
}

impl Dialer {
    pub fn new(tls_cache: Arc<TlsConfigCache>, dial_timeout: Duration, idle_timeout: Duration) -> Self {
        Self {
            tls_cache,
            dial_timeout,
            idle_timeout,
            port: FRONT_TLS_PORT,
        }
    }

    /// Overrides the port every dial targets. Only useful for pointing the
    /// dialer at a local listener in tests; real masquerades are always
    /// dialed on 443.
    #[doc(hidden)]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub async fn dial(&self, masquerade: &Masquerade) -> Result<DialedStream, DialFault> {
        let addr = SocketAddr::new(masquerade.ip(), self.port);

        let tcp = timeout(self.dial_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| DialFault::Transient("tcp connect timed out".to_string()))?
            .map_err(|e| DialFault::Transient(format!("tcp connect failed: {e}")))?;

        let server_name = ServerName::try_from(masquerade.domain().to_string())
            .map_err(|e| DialFault::Permanent(format!("invalid server name: {e}")))?;

        let config = self.tls_cache.get_or_build(masquerade.domain());
        let connector = TlsConnector::from(config);

        let tls = timeout(self.dial_timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| DialFault::Transient("tls handshake timed out".to_string()))?
            .map_err(classify_tls_error)?;

        debug!(domain = masquerade.domain(), ip = %masquerade.ip(), "dialed masquerade");
        Ok(IdleTimeout::new(tls, self.idle_timeout))
    }

    /// Dials against `pool`, trying masquerades from `preferred` (falling
    /// back to the candidate tier) until one connects or the pool is
    /// exhausted. Absorbs every `DialFault` internally: a permanently
    /// faulted masquerade is discarded, a transiently faulted one is set
    /// aside and requeued to its source tier once the call returns, win or
    /// lose. Callers — the request engine, the vetter — never see a
    /// `DialFault` themselves, only a dialed connection or
    /// `NoMasqueradesAvailable` once there is truly nothing left to try.
    pub async fn dial_with(
        &self,
        pool: &PoolState,
        preferred: Tier,
    ) -> Result<(DialedStream, Masquerade, Tier), FrontingError> {
        let mut retry_later: Vec<(Masquerade, Tier)> = Vec::new();

        let result = loop {
            let Some((masquerade, tier)) = pool.pop_for_tier(preferred) else {
                break Err(FrontingError::NoMasqueradesAvailable);
            };

            match self.dial(&masquerade).await {
                Ok(stream) => break Ok((stream, masquerade, tier)),
                Err(DialFault::Permanent(reason)) => {
                    debug!(domain = masquerade.domain(), reason, "permanent dial fault, discarding masquerade");
                }
                Err(DialFault::Transient(reason)) => {
                    debug!(domain = masquerade.domain(), reason, "transient dial fault, will requeue");
                    retry_later.push((masquerade, tier));
                }
            }
        };

        for (masquerade, tier) in retry_later {
            pool.requeue(masquerade, tier);
        }

        result
    }
}

fn classify_tls_error(err: std::io::Error) -> DialFault {
    if let Some(rustls_err) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        return match rustls_err {
            rustls::Error::InvalidCertificate(_)
            | rustls::Error::NoCertificatesPresented
            | rustls::Error::UnsupportedNameType
            | rustls::Error::PeerIncompatible(_)
            | rustls::Error::PeerMisbehaved(_) => {
                DialFault::Permanent(rustls_err.to_string())
            }
            other => DialFault::Transient(other.to_string()),
        };
    }

    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::ConnectionReset => {
            DialFault::Transient(err.to_string())
        }
        _ => DialFault::Transient(err.to_string()),
    }
}
