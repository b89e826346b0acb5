use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use fronting_domain::FrontingError;
use http_body_util::{BodyExt, Full};
use tracing::warn;

use crate::dialer::DialFault;
use crate::pool::{PoolState, Tier};

/// Deadline for the inner HTTP exchange over an already-dialed connection,
/// distinct from the dialer's own TLS dial deadline. A masquerade that
/// dials fine but then stalls mid-request must not hang the retry loop
/// forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

pub use fronting_domain::FrontingError as RequestEngineError;

/// Performs an HTTP request through the masquerade pool, retrying across
/// masquerades on transport failure. The request body is buffered
/// (`Bytes`) up front so each retry attempt can replay it; this means
/// arbitrarily large or genuinely streaming bodies are out of scope, same
/// as the pool's own stated restriction.
pub struct RequestEngine {
    pool: Arc<PoolState>,
}

impl RequestEngine {
    pub fn new(pool: Arc<PoolState>) -> Self {
        Self { pool }
    }

    /// Per the pool's error propagation policy, faults below
    /// `NoMasqueradesAvailable` (permanent/transient dial faults, bad
    /// statuses, timeouts) never escape this function — they only drive
    /// the retry loop and are logged. Only two failures are ever returned
    /// to the caller: the pool ran dry, or every attempt was spent.
    pub async fn round_trip(
        &self,
        request: &http::Request<Bytes>,
    ) -> Result<http::Response<Bytes>, FrontingError> {
        let max_tries = self.pool.config.max_tries;

        for attempt in 0..max_tries {
            let (stream, masquerade, tier) =
                match self.pool.dialer.dial_with(&self.pool, Tier::Vetted).await {
                    Ok(dialed) => dialed,
                    Err(err) => {
                        warn!(attempt, error = %err, "dial exhausted the pool");
                        return Err(err);
                    }
                };

            let wire_request = rewrite_for_wire(request);

            let outcome = tokio::time::timeout(REQUEST_TIMEOUT, super::send_request(stream, wire_request)).await;

            match outcome {
                Ok(Ok(response)) if response.status().is_success() || response.status().is_redirection() => {
                    self.pool.promote(masquerade);
                    return buffer_response(response).await;
                }
                Ok(Ok(response)) => {
                    // Dialed and spoke HTTP fine, but the CDN (or the
                    // target behind it) rejected this particular request
                    // — e.g. 403 for a blocked target domain. The
                    // masquerade itself is still good, so it goes back to
                    // the vetted tier for the next attempt, but this is
                    // not a `commit`: no LastVetted bump, no cache offer.
                    warn!(attempt, domain = masquerade.domain(), status = %response.status(), "request rejected, not committing");
                    self.pool.requeue(masquerade, Tier::Vetted);
                }
                Ok(Err(io_err)) => {
                    let fault = DialFault::Transient(io_err.to_string());
                    warn!(attempt, domain = masquerade.domain(), error = %io_err, "request failed after dial");
                    self.pool.classify_and_route(masquerade, tier, &fault);
                }
                Err(_elapsed) => {
                    let fault = DialFault::Transient("inner request timed out".to_string());
                    warn!(attempt, domain = masquerade.domain(), "request timed out after dial");
                    self.pool.classify_and_route(masquerade, tier, &fault);
                }
            }
        }

        Err(FrontingError::RetriesExhausted {
            attempts: max_tries,
        })
    }
}

/// Rewrites the request for the wire without touching the caller's original
/// request: only the scheme is changed, https to plain http, since the
/// outer TLS layer already came from the dialer and the connection itself
/// is unencrypted from hyper's point of view. The authority is kept intact
/// — the front server still routes on it via the `Host` header, but hyper's
/// http1 encoder only emits an absolute-form request line (`http://host/path`)
/// when the URI carries both scheme and authority; dropping the authority
/// would silently fall back to origin-form instead.
fn rewrite_for_wire(original: &http::Request<Bytes>) -> http::Request<Full<Bytes>> {
    let path_and_query = original
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let authority = original
        .uri()
        .authority()
        .map(|a| a.as_str().to_string())
        .or_else(|| {
            original
                .headers()
                .get(http::header::HOST)
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        });

    let uri = match authority {
        Some(authority) => http::Uri::builder()
            .scheme("http")
            .authority(authority)
            .path_and_query(path_and_query)
            .build()
            .unwrap_or_else(|_| http::Uri::from_static("/")),
        None => path_and_query
            .parse()
            .unwrap_or_else(|_| http::Uri::from_static("/")),
    };

    let mut builder = http::Request::builder()
        .method(original.method().clone())
        .uri(uri)
        .version(original.version());

    for (name, value) in original.headers() {
        builder = builder.header(name, value);
    }

    builder
        .body(Full::new(original.body().clone()))
        .expect("rewritten request carries only headers already valid on the original")
}

async fn buffer_response(
    response: hyper::Response<hyper::body::Incoming>,
) -> Result<http::Response<Bytes>, FrontingError> {
    let (parts, body) = response.into_parts();
    let collected = body
        .collect()
        .await
        .map_err(|e| FrontingError::RequestUnsuccessful(e.to_string()))?;
    Ok(http::Response::from_parts(parts, collected.to_bytes()))
}
