use std::sync::Arc;

use bytes::Bytes;
use fronting_domain::Masquerade;
use http_body_util::Full;
use hyper::{Method, Request, Uri};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::dialer::DialFault;
use crate::pool::{PoolState, Tier};

/// Vets candidates using up to `worker_count` concurrently running workers,
/// each looping until the candidate tier is exhausted. A worker that
/// successfully dials and probes a candidate promotes it to the vetted
/// tier; any failure — dial or probe — discards the candidate for the rest
/// of this process. Dialing itself goes through `Dialer::dial_with`, so a
/// transient dial fault is retried against the next candidate inside the
/// same call rather than surfacing here.
pub async fn run_vetting_pool(pool: Arc<PoolState>, worker_count: usize) {
    info!(worker_count, "starting vetting pool");
    let mut workers = JoinSet::new();
    for _ in 0..worker_count.max(1) {
        let pool = pool.clone();
        workers.spawn(async move {
            loop {
                match pool.dialer.dial_with(&pool, Tier::Candidate).await {
                    Ok((stream, candidate, _tier)) => vet_one(&pool, candidate, stream).await,
                    Err(_no_masquerades_available) => break,
                }
            }
        });
    }
    while workers.join_next().await.is_some() {}
    info!(vetted = pool.vetted_len(), "vetting pool finished");
}

/// Unlike the request engine's retry loop, vetting never re-enqueues a
/// candidate that fails its probe. Each candidate gets exactly one probe
/// attempt per process; a candidate that merely timed out once is simply
/// not promoted, rather than being fed back into the same worker's tight
/// loop indefinitely.
async fn vet_one<S>(pool: &PoolState, candidate: Masquerade, stream: S)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    match probe(stream, &pool.config.probe_url).await {
        Ok(()) => {
            debug!(domain = candidate.domain(), ip = %candidate.ip(), "candidate vetted");
            pool.promote(candidate);
        }
        Err(fault) => {
            debug!(domain = candidate.domain(), fault = %fault, "probe failed, discarding candidate");
        }
    }
}

/// A bare HTTP HEAD probe against a fixed, known-good CloudFront object.
/// Deliberately plain `http` (not `https`): the stream handed in is already
/// TLS-wrapped by the dialer, so this is just the inner HTTP exchange.
/// Succeeds iff the response status is exactly 200 — unlike the request
/// engine's own commit check, a redirect here is not good enough evidence
/// the candidate actually reaches the CDN's HTTP layer.
async fn probe<S>(stream: S, probe_url: &str) -> Result<(), DialFault>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let parsed: Uri = probe_url
        .parse()
        .map_err(|e| DialFault::Permanent(format!("invalid probe url: {e}")))?;
    let host = parsed.host().unwrap_or_default().to_string();
    let origin_form: Uri = parsed
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .parse()
        .map_err(|e| DialFault::Permanent(format!("invalid probe path: {e}")))?;

    let request = Request::builder()
        .method(Method::HEAD)
        .uri(origin_form)
        .header("Host", host)
        .body(Full::new(Bytes::new()))
        .map_err(|e| DialFault::Permanent(e.to_string()))?;

    let response = crate::http::send_request(stream, request)
        .await
        .map_err(|e| DialFault::Transient(e.to_string()))?;

    if response.status() == hyper::StatusCode::OK {
        Ok(())
    } else {
        Err(DialFault::Transient(format!(
            "probe returned status {}",
            response.status()
        )))
    }
}
