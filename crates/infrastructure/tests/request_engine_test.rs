use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use fronting_domain::{Config, FrontingError, Masquerade};
use fronting_infrastructure::dialer::Dialer;
use fronting_infrastructure::http::RequestEngine;
use fronting_infrastructure::{PoolState, TlsConfigCache};
use http_body_util::Full;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use rustls::RootCertStore;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// Finds a currently-free TCP port on loopback by binding to port 0 and
/// releasing it immediately. Good enough for test fixtures that need to
/// reuse one port number across two different loopback addresses (every
/// `127.0.0.0/8` address routes locally, so `127.0.0.1` and `127.0.0.2`
/// are distinct dial targets that can share a port number).
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .expect("bind ephemeral port");
    listener.local_addr().unwrap().port()
}

/// Spins up a local TLS+HTTP1 listener at `bind_addr` standing in for a
/// CDN edge. Each accepted connection serves exactly one request
/// (matching the pool's no-keep-alive design) and answers with the next
/// status popped from `statuses`, defaulting to 200 once exhausted.
/// Returns a root store trusting the listener's self-signed cert.
fn spawn_front(bind_addr: SocketAddr, statuses: Vec<u16>) -> Arc<RootCertStore> {
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).expect("self-signed cert");
    let cert_der = cert.der().clone();
    let key_der = rustls::pki_types::PrivateKeyDer::Pkcs8(signing_key.serialize_der().into());

    let mut roots = RootCertStore::empty();
    roots.add(cert_der.clone()).expect("trust self-signed root");
    let roots = Arc::new(roots);

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der)
        .expect("server config");
    let acceptor = TlsAcceptor::from(Arc::new(server_config));

    let std_listener = std::net::TcpListener::bind(bind_addr).expect("bind test front");
    std_listener.set_nonblocking(true).unwrap();
    let listener = TcpListener::from_std(std_listener).unwrap();

    let remaining = Arc::new(Mutex::new(VecDeque::from(statuses)));

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let acceptor = acceptor.clone();
            let remaining = remaining.clone();
            tokio::spawn(async move {
                let Ok(tls) = acceptor.accept(stream).await else {
                    return;
                };
                let io = TokioIo::new(tls);
                let remaining = remaining.clone();
                let service = service_fn(move |_req: Request<hyper::body::Incoming>| {
                    let remaining = remaining.clone();
                    async move {
                        let status = remaining.lock().unwrap().pop_front().unwrap_or(200);
                        let response = Response::builder()
                            .status(StatusCode::from_u16(status).unwrap())
                            .body(Full::new(Bytes::new()))
                            .unwrap();
                        Ok::<_, Infallible>(response)
                    }
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(io, service)
                    .await;
            });
        }
    });

    roots
}

/// A bound-then-dropped listener: connecting to it is refused, standing
/// in for a dead masquerade.
fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .expect("bind then drop");
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn pool_with(
    roots: Arc<RootCertStore>,
    port: u16,
    candidates: Vec<Masquerade>,
    vetted: Vec<Masquerade>,
) -> Arc<PoolState> {
    let tls_cache = Arc::new(TlsConfigCache::with_roots(roots));
    let dialer = Dialer::new(tls_cache.clone(), Duration::from_secs(2), Duration::from_secs(30))
        .with_port(port);
    Arc::new(PoolState::with_dialer(
        Config::default(),
        candidates,
        vetted,
        16,
        16,
        16,
        tls_cache,
        dialer,
    ))
}

fn demo_request() -> http::Request<Bytes> {
    http::Request::builder()
        .method("GET")
        .uri("https://target.example.com/path")
        .header("Host", "target.example.com")
        .body(Bytes::new())
        .unwrap()
}

/// S1: one masquerade, a single 200 response — succeeds on the first
/// attempt and the masquerade is committed back to the vetted tier.
#[tokio::test]
async fn s1_happy_path_commits_on_first_attempt() {
    let port = free_port();
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    let roots = spawn_front(addr, vec![200]);
    let masquerade = Masquerade::new("localhost", addr.ip());
    let pool = pool_with(roots, port, vec![], vec![masquerade]);
    let engine = RequestEngine::new(pool.clone());

    let response = engine.round_trip(&demo_request()).await.expect("should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(pool.vetted_len(), 1);
    assert_eq!(pool.drain_to_cache().len(), 1);
}

/// S2: the front returns 403 twice before a 200; the same masquerade is
/// retried each time and the response succeeds on the third attempt.
#[tokio::test]
async fn s2_retries_across_bad_statuses_then_succeeds() {
    let port = free_port();
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    let roots = spawn_front(addr, vec![403, 403, 200]);
    let masquerade = Masquerade::new("localhost", addr.ip());
    let pool = pool_with(roots, port, vec![], vec![masquerade]);
    let engine = RequestEngine::new(pool.clone());

    let response = engine.round_trip(&demo_request()).await.expect("should eventually succeed");
    assert_eq!(response.status(), StatusCode::OK);
    // Only the final success stages a cache write — the two 403s never commit.
    assert_eq!(pool.drain_to_cache().len(), 1);
}

/// S3: the first masquerade's cert isn't trusted and gets discarded
/// permanently; the second masquerade is fine and serves the request.
#[tokio::test]
async fn s3_certificate_fault_is_discarded_and_second_masquerade_serves() {
    let port = free_port();
    let good_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    let bad_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2)), port);

    let roots = spawn_front(good_addr, vec![200]);
    // Second listener's cert is never added to `roots`, so it fails
    // verification regardless of which masquerade tries it first.
    spawn_front(bad_addr, vec![200]);

    let bad = Masquerade::new("localhost", bad_addr.ip());
    let good = Masquerade::new("localhost", good_addr.ip());
    let pool = pool_with(roots, port, vec![], vec![bad, good]);
    let engine = RequestEngine::new(pool.clone());

    let response = engine.round_trip(&demo_request()).await.expect("good masquerade serves");
    assert_eq!(response.status(), StatusCode::OK);
    // The bad masquerade was discarded permanently, the good one committed.
    assert_eq!(pool.vetted_len(), 1);
}

/// S4: no vetted masquerades, only a candidate — the engine still
/// succeeds by falling back to the candidate tier and promotes it.
#[tokio::test]
async fn s4_falls_back_to_candidate_tier_and_promotes() {
    let port = free_port();
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    let roots = spawn_front(addr, vec![200]);
    let masquerade = Masquerade::new("localhost", addr.ip());
    let pool = pool_with(roots, port, vec![masquerade], vec![]);
    let engine = RequestEngine::new(pool.clone());

    let response = engine.round_trip(&demo_request()).await.expect("should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(pool.candidate_len(), 0);
    assert_eq!(pool.vetted_len(), 1);
}

/// S5: every masquerade returns 500. Retries exhaust, and every
/// masquerade that dialed fine is still sitting in the vetted tier.
#[tokio::test]
async fn s5_exhaustion_leaves_all_masquerades_in_the_vetted_tier() {
    let port = free_port();
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    let roots = spawn_front(addr, vec![500; 10]);
    let vetted: Vec<Masquerade> = (0..3).map(|_| Masquerade::new("localhost", addr.ip())).collect();

    let mut config = Config::default();
    config.max_tries = 6;
    let tls_cache = Arc::new(TlsConfigCache::with_roots(roots));
    let dialer = Dialer::new(tls_cache.clone(), Duration::from_secs(2), Duration::from_secs(30))
        .with_port(port);
    let pool = Arc::new(PoolState::with_dialer(config, vec![], vetted, 16, 16, 16, tls_cache, dialer));
    let engine = RequestEngine::new(pool.clone());

    let err = engine.round_trip(&demo_request()).await.unwrap_err();
    assert!(matches!(err, FrontingError::RetriesExhausted { attempts: 6 }));
    assert_eq!(pool.vetted_len(), 3);
}

/// A dial against a refused TCP connection is transient. With only one
/// masquerade in the pool, the dialer's internal retry loop tries it once,
/// buffers it for retry, finds the queue empty, and reports
/// `NoMasqueradesAvailable` immediately — retries cannot help here, so
/// `round_trip` aborts on the very first attempt instead of spending all of
/// `max_tries`. The masquerade itself is flushed back to the vetted tier it
/// came from once the dial call returns.
#[tokio::test]
async fn dial_failure_with_no_fallback_aborts_with_no_masquerades_available() {
    let addr = closed_port();
    let masquerade = Masquerade::new("localhost", addr.ip());
    let mut config = Config::default();
    config.max_tries = 3;
    let tls_cache = Arc::new(TlsConfigCache::with_roots(Arc::new(RootCertStore::empty())));
    let dialer = Dialer::new(tls_cache.clone(), Duration::from_secs(2), Duration::from_secs(30))
        .with_port(addr.port());
    let pool = Arc::new(PoolState::with_dialer(
        config,
        vec![],
        vec![masquerade],
        16,
        16,
        16,
        tls_cache,
        dialer,
    ));
    let engine = RequestEngine::new(pool.clone());

    let err = engine.round_trip(&demo_request()).await.unwrap_err();
    assert!(matches!(err, FrontingError::NoMasqueradesAvailable));
    assert_eq!(pool.vetted_len(), 1);
}
